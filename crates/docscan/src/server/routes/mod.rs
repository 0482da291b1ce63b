//! API routes for the extraction server

pub mod extract;
pub mod jobs;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Background PDF extraction
        .route(
            "/pdf",
            post(jobs::submit_pdf).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/progress/:task_id", get(jobs::get_progress))
        .route("/jobs", get(jobs::list_jobs))
        // Synchronous extraction
        .route(
            "/image",
            post(extract::extract_image).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/ocr",
            post(extract::legacy_ocr).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Info
        .route("/info", get(info))
}

/// Run blocking extraction work off the async runtime
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))?
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(json!({
        "name": "docscan",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Text extraction from images and PDFs with OCR fallback",
        "ocr": state.engine_info(),
        "preprocessing": {
            "enabled": config.preprocessing.enabled,
            "clip_limit": config.preprocessing.clip_limit,
            "tile_grid": [config.preprocessing.tile_grid.0, config.preprocessing.tile_grid.1],
        },
        "pdf": {
            "raster_dpi": config.pdf.raster_dpi,
        },
        "limits": {
            "max_upload_size": config.server.max_upload_size,
            "queue_capacity": config.jobs.queue_capacity,
            "job_timeout_secs": config.jobs.job_timeout_secs,
            "result_ttl_secs": config.jobs.result_ttl_secs,
        },
        "endpoints": {
            "POST /api/pdf": "Upload a PDF for background extraction",
            "GET /api/progress/:task_id": "Poll a PDF job",
            "GET /api/jobs": "List jobs and queue stats",
            "POST /api/image": "OCR an image synchronously",
            "POST /api/ocr": "Legacy single-endpoint upload (PDF text layer or image OCR)",
            "GET /api/info": "Service and engine info"
        }
    }))
}
