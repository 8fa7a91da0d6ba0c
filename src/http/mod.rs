//! HTTP surface: the REST API the viewer frontend talks to
//!
//! Thin handlers over the hierarchy store, the render pipeline, and the
//! interpretation cache. Domain errors carry their own HTTP status mapping.

mod browse;
mod image;
mod interpret;
mod upload;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use tower_http::cors::CorsLayer;
use tracing::error;

use interp::Interpreter;

use crate::config::Config;
use crate::error::PrismError;
use crate::hierarchy::HierarchyStore;
use crate::interpret::InterpretationCache;
use crate::storage::StorageBackend;

/// Uploads carry whole DICOM series in one request
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HierarchyStore>,
    pub cache: Arc<InterpretationCache>,
    pub interpreter: Arc<dyn Interpreter>,
    pub storage: Arc<dyn StorageBackend>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload::upload))
        .route("/api/studies", get(browse::list_studies))
        .route("/api/studies/{study_uid}/series", get(browse::list_series))
        .route("/api/series/{series_uid}/slices", get(browse::list_slices))
        .route("/api/slices/{sop_uid}/image", get(image::slice_image))
        .route(
            "/api/slices/{sop_uid}/image-base64",
            get(image::slice_image_base64),
        )
        .route("/api/slices/{sop_uid}/metadata", get(browse::slice_metadata))
        .route(
            "/api/interpret/series/{series_uid}",
            get(interpret::interpret_series_get),
        )
        .route("/api/interpret/series", post(interpret::interpret_series_post))
        .route("/api/interpret/single", post(interpret::interpret_single))
        .route("/api/interpret/status", get(interpret::status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": state.config.server.id,
    }))
}

/// Error surface of the API handlers
pub enum ApiError {
    Domain(PrismError),
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<PrismError> for ApiError {
    fn from(err: PrismError) -> Self {
        ApiError::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Domain(err) => {
                let status = match &err {
                    PrismError::UnknownKey { .. } => StatusCode::NOT_FOUND,
                    PrismError::UnparsableRecord(_)
                    | PrismError::MissingRequiredTag(_)
                    | PrismError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
                    PrismError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    PrismError::ProviderError(_) => StatusCode::BAD_GATEWAY,
                    PrismError::InternalConsistency(_)
                    | PrismError::Storage(_)
                    | PrismError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("request failed: {}", err);
                }
                (status, err.kind(), err.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": kind,
        }));
        (status, body).into_response()
    }
}
