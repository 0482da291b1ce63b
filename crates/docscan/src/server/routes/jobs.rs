//! PDF job submission and progress endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::intake::{read_upload, FileKind, MultipartBody};
use crate::processing::{JobPoll, JobSummary, QueueStats};
use crate::server::state::AppState;

/// Response from PDF submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
}

/// Job listing
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobSummary>,
    pub stats: QueueStats,
}

/// POST /api/pdf - Queue a PDF for background extraction
pub async fn submit_pdf(
    State(state): State<AppState>,
    multipart: MultipartBody,
) -> Result<Json<SubmitResponse>> {
    let upload = read_upload(multipart).await?.require(FileKind::Pdf)?;
    let task_id = state.registry().submit(upload.filename, upload.data)?;
    Ok(Json(SubmitResponse { task_id }))
}

/// GET /api/progress/:task_id - Poll a job
pub async fn get_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<JobPoll>> {
    let job_id = Uuid::parse_str(&task_id).map_err(|_| Error::JobNotFound(task_id.clone()))?;
    state
        .registry()
        .poll(job_id)
        .map(Json)
        .ok_or(Error::JobNotFound(task_id))
}

/// GET /api/jobs - List jobs with queue stats
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    let registry = state.registry();
    Json(JobsResponse {
        jobs: registry.list(),
        stats: registry.stats(),
    })
}
