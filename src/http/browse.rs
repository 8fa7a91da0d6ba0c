//! Read-only hierarchy listings and slice metadata

use axum::extract::{Path, State};
use axum::Json;

use crate::hierarchy::{SeriesSummary, SliceSummary, StudySummary};

use super::{ApiError, AppState};

pub async fn list_studies(State(state): State<AppState>) -> Json<Vec<StudySummary>> {
    Json(state.store.list_studies())
}

pub async fn list_series(
    State(state): State<AppState>,
    Path(study_uid): Path<String>,
) -> Result<Json<Vec<SeriesSummary>>, ApiError> {
    Ok(Json(state.store.list_series(&study_uid)?))
}

pub async fn list_slices(
    State(state): State<AppState>,
    Path(series_uid): Path<String>,
) -> Result<Json<Vec<SliceSummary>>, ApiError> {
    Ok(Json(state.store.list_slices(&series_uid)?))
}

/// Everything the viewer shows about one slice, minus the pixel data
pub async fn slice_metadata(
    State(state): State<AppState>,
    Path(sop_uid): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.store.slice(&sop_uid)?;
    Ok(Json(serde_json::json!({
        "sop_uid": record.sop_uid,
        "series_uid": record.series_uid,
        "study_uid": record.study_uid,
        "patient_id": record.patient_id,
        "patient_name": record.patient_name,
        "modality": record.modality,
        "body_part": record.body_part,
        "study_date": record.study_date,
        "study_description": record.study_description,
        "series_number": record.series_number,
        "series_description": record.series_description,
        "instance_number": record.instance_number,
        "slice_location": record.slice_location,
        "slice_thickness": record.slice_thickness,
        "pixel_spacing": record.pixel_spacing,
        "rows": record.rows,
        "columns": record.columns,
        "bits_allocated": record.bits_allocated,
        "bits_stored": record.bits_stored,
        "signed": record.signed,
        "rescale_slope": record.rescale_slope,
        "rescale_intercept": record.rescale_intercept,
        "default_window": record.default_window.map(|w| serde_json::json!({
            "center": w.center,
            "width": w.width,
        })),
        "source_path": record.source_path,
        "file_id": record.file_id,
    })))
}
