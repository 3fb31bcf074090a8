//! Request handlers.

use super::AppState;
use super::types::{ErrorResponse, HealthResponse, StagesResponse};
use axum::Json;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sendbox_core::{Report, Stage, Submission};
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Error returned by a handler, rendered as [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, context)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::new(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stages_handler() -> Json<StagesResponse> {
    Json(StagesResponse {
        stages: Stage::ALL.to_vec(),
    })
}

/// File part as received, not yet handed to the pipeline.
struct Upload {
    filename: String,
    path: TempPath,
}

/// `POST /submit`: fields `stage` (text) and `file` (the `.tgz`).
///
/// Without a file the response carries only the "no file" warning. Every
/// evaluated submission answers 200; the outcome is in the report body.
pub async fn submit_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Report>, ApiError> {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("submission rate limit exceeded");
            return Err(ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many submissions, try again shortly",
            ));
        }
    }

    let config = state.evaluator.config();
    let mut stage_field: Option<String> = None;
    let mut upload: Option<Upload> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("stage") => stage_field = Some(field.text().await?),
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    continue;
                }
                let path =
                    receive_file(&mut field, &config.upload_dir, config.limits.max_upload_bytes)
                        .await?;
                upload = Some(Upload { filename, path });
            }
            _ => {}
        }
    }

    let Some(upload) = upload else {
        info!("submission without file");
        return Ok(Json(Report::no_file()));
    };

    let stage = stage_field
        .ok_or_else(|| ApiError::bad_request("Missing stage field"))?
        .parse::<Stage>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let path = upload
        .path
        .keep()
        .map_err(|e| ApiError::internal("Failed to stage upload", e))?;

    let result = state
        .evaluator
        .evaluate(Submission::new(upload.filename, path, stage))
        .await;

    Ok(Json(Report::from_result(result)))
}

/// Stream one file field into a fresh artifact under `dir`.
///
/// The artifact is deleted if anything fails before the caller keeps it.
async fn receive_file(
    field: &mut Field<'_>,
    dir: &Path,
    max_bytes: u64,
) -> Result<TempPath, ApiError> {
    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".tgz")
        .tempfile_in(dir)
        .map_err(|e| ApiError::internal("Failed to create upload file", e))?;
    let (file, path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        written = written.saturating_add(chunk.len() as u64);
        if written > max_bytes {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds {} bytes", max_bytes),
            ));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal("Failed to write upload", e))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal("Failed to write upload", e))?;

    Ok(path)
}
