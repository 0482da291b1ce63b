//! Error types for the extraction service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Extraction service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request carried no `file` field
    #[error("No file uploaded")]
    MissingFile,

    /// File field present but without a filename
    #[error("No file selected")]
    EmptyFilename,

    /// File field present but zero bytes long
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Malformed multipart body
    #[error("Invalid upload: {0}")]
    Multipart(String),

    /// File kind not accepted by the endpoint
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Image bytes could not be decoded or re-encoded
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// PDF could not be loaded
    #[error("PDF error: {0}")]
    PdfParse(String),

    /// Page rasterisation failed
    #[error("Rasterization failed: {0}")]
    Rasterize(String),

    /// OCR engine failed
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Job id unknown to the registry
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job queue at capacity
    #[error("Job queue is full ({0} pending), try again later")]
    QueueFull(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an image decode error
    pub fn image_decode(message: impl Into<String>) -> Self {
        Self::ImageDecode(message.into())
    }

    /// Create a PDF parse error
    pub fn pdf_parse(message: impl Into<String>) -> Self {
        Self::PdfParse(message.into())
    }

    /// Create an OCR error
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    /// Create a rasterization error
    pub fn rasterize(message: impl Into<String>) -> Self {
        Self::Rasterize(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFile
            | Error::EmptyFilename
            | Error::EmptyFile
            | Error::Multipart(_)
            | Error::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            Error::JobNotFound(_) => StatusCode::NOT_FOUND,
            Error::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_)
            | Error::ImageDecode(_)
            | Error::PdfParse(_)
            | Error::Rasterize(_)
            | Error::Ocr(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(Error::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::EmptyFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::UnsupportedFileType("text/plain".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::JobNotFound("abc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_decode_errors_pass_message_through() {
        let err = Error::image_decode("invalid PNG signature");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("invalid PNG signature"));
    }

    #[test]
    fn test_queue_full_is_unavailable() {
        assert_eq!(Error::QueueFull(8).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
