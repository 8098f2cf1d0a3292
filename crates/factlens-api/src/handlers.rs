//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use factlens_core::{AnalysisResult, AnalyzeRequest, Job, JobState, Submission};

use crate::error::ApiError;
use crate::AppState;

/// Body of `GET /api/status/:job_id`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub job_id: Uuid,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.state,
            results: job.result,
            error: job.error,
        }
    }
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the factlens API",
        "health": "/api/health",
    }))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Submit a video URL for analysis.
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Submission>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let submission = state.runner.submit(request).await?;
    Ok(Json(submission))
}

/// Current state of a job. Malformed ids are reported as unknown.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = Uuid::parse_str(job_id.trim())
        .ok()
        .and_then(|id| state.runner.job(&id))
        .ok_or_else(|| {
            debug!(job_id = %job_id, "Status requested for unknown job");
            ApiError::NotFound("Job not found".to_string())
        })?;

    Ok(Json(StatusResponse::from(job)))
}
