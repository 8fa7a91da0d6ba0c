//! Interpretation endpoints: series and single-slice requests, plus status

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Deserialize;

use crate::error::PrismError;
use crate::interpret::{self, InterpretationResult};

use super::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct InterpretQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeriesRequest {
    pub series_uid: String,
    pub context: Option<String>,
    pub sample_count: Option<usize>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct SingleRequest {
    pub sop_uid: String,
    pub context: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

pub async fn interpret_series_get(
    State(state): State<AppState>,
    Path(series_uid): Path<String>,
    Query(query): Query<InterpretQuery>,
) -> Result<Response, ApiError> {
    run_series(&state, &series_uid, None, query.refresh, None).await
}

pub async fn interpret_series_post(
    State(state): State<AppState>,
    Json(request): Json<SeriesRequest>,
) -> Result<Response, ApiError> {
    if request.sample_count == Some(0) {
        return Err(ApiError::bad_request("sample_count must be at least 1"));
    }
    run_series(
        &state,
        &request.series_uid,
        request.sample_count,
        request.refresh,
        request.context.as_deref(),
    )
    .await
}

pub async fn interpret_single(
    State(state): State<AppState>,
    Json(request): Json<SingleRequest>,
) -> Result<Response, ApiError> {
    let record = state.store.slice(&request.sop_uid)?;
    let outcome = interpret::interpret_single(
        &state.cache,
        state.interpreter.as_ref(),
        &record,
        request.refresh,
        request.context.as_deref(),
    )
    .await;
    respond(outcome)
}

pub async fn status(State(state): State<AppState>) -> Json<interpret::InterpreterStatus> {
    Json(interpret::status(
        state.interpreter.as_ref(),
        &state.config.interpreter.model,
        &state.cache,
    ))
}

async fn run_series(
    state: &AppState,
    series_uid: &str,
    sample_count: Option<usize>,
    refresh: bool,
    context: Option<&str>,
) -> Result<Response, ApiError> {
    let outcome = interpret::interpret_series(
        &state.store,
        &state.cache,
        state.interpreter.as_ref(),
        series_uid,
        sample_count.unwrap_or(state.config.interpretation.sample_count),
        refresh,
        context,
    )
    .await;
    respond(outcome)
}

/// Provider failures keep the interpretation response shape so the frontend
/// can show the error inline; everything else uses the generic error body.
fn respond(outcome: crate::error::Result<InterpretationResult>) -> Result<Response, ApiError> {
    match outcome {
        Ok(result) => Ok(Json(result).into_response()),
        Err(PrismError::ProviderUnavailable(msg)) => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(InterpretationResult::failure(msg)),
        )
            .into_response()),
        Err(PrismError::ProviderError(msg)) => Ok((
            StatusCode::BAD_GATEWAY,
            Json(InterpretationResult::failure(msg)),
        )
            .into_response()),
        Err(other) => Err(other.into()),
    }
}
