//! Job endpoints: submission, conversion, removal, snapshots, downloads.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use reelsmith_core::{
    EngineError, HandleId, JobError, JobId, JobSnapshot, QualityLevel, SourceFile,
};

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn job_error_response(err: JobError) -> Response {
    let status = match &err {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::AlreadyRunning | JobError::RemoveWhileConverting(_) => StatusCode::CONFLICT,
        JobError::Engine(EngineError::NotReady)
        | JobError::Engine(EngineError::SecurityPrecondition { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        JobError::Engine(EngineError::Busy) => StatusCode::CONFLICT,
        JobError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

/// GET /jobs - snapshot of all jobs in submission order.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobSnapshot>> {
    Json(state.queue().snapshot().await)
}

/// GET /jobs/{id} - snapshot of one job.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.queue().job(&JobId::from(id.as_str())).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("job not found: {}", id)),
    }
}

/// POST /jobs - submit files as multipart form data.
///
/// Every part with a filename is taken as an input clip; an optional
/// `modified_ms` text part carries the source modification time used in the
/// identity key (it applies to all files in the request). Duplicates are
/// dropped silently: the response lists only newly created jobs.
pub async fn upload_jobs(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut modified_ms: i64 = 0;
    let mut uploads: Vec<(String, String, bytes::Bytes)> = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if let Some(file_name) = field.file_name().map(str::to_string) {
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| "video/webm".to_string());
                    match field.bytes().await {
                        Ok(data) => uploads.push((file_name, content_type, data)),
                        Err(e) => {
                            warn!(file = %file_name, error = %e, "upload read failed");
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                format!("failed to read upload: {}", e),
                            );
                        }
                    }
                } else if field.name() == Some("modified_ms") {
                    if let Ok(text) = field.text().await {
                        modified_ms = text.trim().parse().unwrap_or(0);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {}", e),
                )
            }
        }
    }

    if uploads.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no files in request");
    }

    let files: Vec<SourceFile> = uploads
        .into_iter()
        .map(|(name, content_type, data)| SourceFile {
            size_bytes: data.len() as u64,
            name,
            modified_ms,
            content_type,
            data,
        })
        .collect();

    let created = state.queue().add_files(files).await;
    (StatusCode::CREATED, Json(created)).into_response()
}

#[derive(Serialize)]
pub struct ConvertStartedResponse {
    pub status: String,
    pub count: usize,
}

/// POST /jobs/{id}/convert - start one conversion in the background.
pub async fn convert_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.queue().spawn_convert(&JobId::from(id.as_str())).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ConvertStartedResponse {
                status: "started".to_string(),
                count: 1,
            }),
        )
            .into_response(),
        Err(err) => job_error_response(err),
    }
}

/// POST /jobs/convert-all - start a batch over every non-completed job.
pub async fn convert_all(State(state): State<Arc<AppState>>) -> Response {
    match state.queue().spawn_convert_all().await {
        Ok(count) => (
            StatusCode::ACCEPTED,
            Json(ConvertStartedResponse {
                status: "started".to_string(),
                count,
            }),
        )
            .into_response(),
        Err(err) => job_error_response(err),
    }
}

/// DELETE /jobs/{id} - remove a job and release its handles.
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.queue().remove(&JobId::from(id.as_str())).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => job_error_response(err),
    }
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: usize,
}

/// DELETE /jobs - remove every job.
pub async fn clear_jobs(State(state): State<Arc<AppState>>) -> Response {
    match state.queue().clear().await {
        Ok(removed) => Json(ClearedResponse { removed }).into_response(),
        Err(err) => job_error_response(err),
    }
}

/// GET /jobs/{id}/download - the converted output as an attachment.
pub async fn download_output(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let job_id = JobId::from(id.as_str());
    let Some(handle_id) = state.queue().output_handle(&job_id).await else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("job {} has no output; is it completed?", id),
        );
    };
    serve_handle(&state, &handle_id, "attachment").await
}

/// GET /jobs/{id}/preview - the original input for inline playback.
pub async fn preview_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let job_id = JobId::from(id.as_str());
    let Some(handle_id) = state.queue().input_handle(&job_id).await else {
        return error_response(StatusCode::NOT_FOUND, format!("job not found: {}", id));
    };
    serve_handle(&state, &handle_id, "inline").await
}

async fn serve_handle(state: &AppState, handle_id: &HandleId, disposition: &str) -> Response {
    let Some(handle) = state.handles().get(handle_id).await else {
        return error_response(StatusCode::GONE, "media handle has been revoked");
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, handle.content_type.clone())
        .header(
            header::CONTENT_DISPOSITION,
            format!("{}; filename=\"{}\"", disposition, handle.file_name),
        )
        .body(Body::from(handle.data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[derive(Serialize, Deserialize)]
pub struct QualityBody {
    pub quality: String,
}

/// GET /quality - the current global quality selection.
pub async fn get_quality(State(state): State<Arc<AppState>>) -> Json<QualityBody> {
    Json(QualityBody {
        quality: state.queue().quality().await.to_string(),
    })
}

/// PUT /quality - change the global quality selection. Unknown tags fail
/// closed to the highest quality. Not retroactive for a job already
/// converting.
pub async fn set_quality(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QualityBody>,
) -> Json<QualityBody> {
    let level = QualityLevel::parse(&body.quality);
    state.queue().set_quality(level).await;
    Json(QualityBody {
        quality: level.to_string(),
    })
}
