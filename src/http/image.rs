//! Rendered slice delivery, as raw bytes or base64 JSON

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::header;
use serde::Deserialize;

use crate::render::{self, OutputFormat};

use super::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    pub format: Option<String>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

impl ImageQuery {
    fn output_format(&self) -> Result<OutputFormat, ApiError> {
        match &self.format {
            None => Ok(OutputFormat::Png),
            Some(name) => OutputFormat::from_name(name)
                .ok_or_else(|| ApiError::bad_request(format!("unsupported image format '{}'", name))),
        }
    }
}

pub async fn slice_image(
    State(state): State<AppState>,
    Path(sop_uid): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let format = query.output_format()?;
    let record = state.store.slice(&sop_uid)?;
    let raster = render::render(&record, query.window_center, query.window_width)?;
    let bytes = render::encode(&raster, format)?;
    Ok((
        [(header::CONTENT_TYPE, format.media_type())],
        bytes,
    )
        .into_response())
}

pub async fn slice_image_base64(
    State(state): State<AppState>,
    Path(sop_uid): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let format = query.output_format()?;
    let record = state.store.slice(&sop_uid)?;
    let raster = render::render(&record, query.window_center, query.window_width)?;
    let bytes = render::encode(&raster, format)?;
    Ok(Json(serde_json::json!({
        "sop_uid": sop_uid,
        "media_type": format.media_type(),
        "data": BASE64.encode(bytes),
    })))
}
