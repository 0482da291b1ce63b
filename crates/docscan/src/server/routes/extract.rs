//! Synchronous extraction endpoints

use axum::{
    extract::State,
    Json,
};
use serde::Serialize;

use super::run_blocking;
use crate::error::Result;
use crate::intake::{read_upload, FileKind, MultipartBody};
use crate::server::state::AppState;

/// Synchronous extraction result
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub status: &'static str,
    pub text: String,
}

/// POST /api/image - OCR an uploaded image
pub async fn extract_image(
    State(state): State<AppState>,
    multipart: MultipartBody,
) -> Result<Json<ExtractResponse>> {
    let upload = read_upload(multipart).await?.require(FileKind::Image)?;
    let extractor = state.extractor().clone();
    let text = run_blocking(move || extractor.extract_image(&upload.data)).await?;

    Ok(Json(ExtractResponse {
        status: "Image processed successfully",
        text,
    }))
}

/// POST /api/ocr - Legacy upload: PDF text layer, otherwise image OCR
pub async fn legacy_ocr(
    State(state): State<AppState>,
    multipart: MultipartBody,
) -> Result<Json<ExtractResponse>> {
    let upload = read_upload(multipart).await?;
    let extractor = state.extractor().clone();

    let response = if upload.kind() == FileKind::Pdf {
        let text = run_blocking(move || extractor.extract_pdf_text_layer(&upload.data)).await?;
        ExtractResponse {
            status: "PDF uploaded successfully",
            text,
        }
    } else {
        let text = run_blocking(move || extractor.extract_image(&upload.data)).await?;
        ExtractResponse {
            status: "Image uploaded successfully",
            text,
        }
    };

    Ok(Json(response))
}
