//! Multipart upload: DICOM files in, hierarchy placements out

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::hierarchy::IngestOutcome;
use crate::ingest;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<IngestOutcome>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: usize,
    pub failed: usize,
    pub results: Vec<FileOutcome>,
}

/// Accepts `files` parts (the DICOM payloads) and optional parallel `paths`
/// parts carrying each file's upload-relative path for the folder-name
/// fallbacks. A file that fails to parse is reported per-file and does not
/// fail the batch.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut paths: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("files") => {
                let filename = field
                    .file_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "upload.dcm".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read '{}': {}", filename, e)))?;
                files.push((filename, data.to_vec()));
            }
            Some("paths") => {
                let path = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read path field: {}", e)))?;
                paths.push(path);
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("upload carried no files"));
    }

    let mut results = Vec::with_capacity(files.len());
    let mut uploaded = 0;
    let mut failed = 0;

    for (i, (filename, data)) in files.iter().enumerate() {
        let relative_path = paths.get(i).map(String::as_str).unwrap_or(filename);
        match ingest_one(&state, relative_path, data).await {
            Ok(placement) => {
                uploaded += 1;
                results.push(FileOutcome {
                    filename: filename.clone(),
                    status: "ok",
                    error: None,
                    placement: Some(placement),
                });
            }
            Err(err) => {
                failed += 1;
                warn!(filename = %filename, "rejected upload: {}", err);
                results.push(FileOutcome {
                    filename: filename.clone(),
                    status: "error",
                    error: Some(err.to_string()),
                    placement: None,
                });
            }
        }
    }

    info!(uploaded, failed, "processed upload batch");
    Ok(Json(UploadResponse {
        uploaded,
        failed,
        results,
    }))
}

async fn ingest_one(state: &AppState, relative_path: &str, data: &[u8]) -> Result<IngestOutcome> {
    let record = ingest::parse_slice(data, relative_path)?;
    state.storage.store_slice_file(&record.file_id, data).await?;
    state.store.ingest(record)
}
