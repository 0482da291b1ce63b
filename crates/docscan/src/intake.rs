//! Multipart upload intake and file classification

use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use bytes::Bytes;
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Name of the multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

/// Kind of uploaded file
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Unknown,
}

impl FileKind {
    /// Classify from a MIME type string
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence == "application/pdf" {
            FileKind::Pdf
        } else if essence.starts_with("image/") {
            FileKind::Image
        } else {
            FileKind::Unknown
        }
    }

    /// Classify from a filename extension
    pub fn from_filename(filename: &str) -> Self {
        mime_guess::from_path(Path::new(filename))
            .iter()
            .map(|m| Self::from_mime(m.essence_str()))
            .find(|kind| *kind != FileKind::Unknown)
            .unwrap_or(FileKind::Unknown)
    }

    /// Declared content type first, then extension
    pub fn classify(content_type: Option<&str>, filename: &str) -> Self {
        match content_type.map(Self::from_mime) {
            Some(kind) if kind != FileKind::Unknown => kind,
            _ => Self::from_filename(filename),
        }
    }
}

/// A validated upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn kind(&self) -> FileKind {
        FileKind::classify(self.content_type.as_deref(), &self.filename)
    }

    /// Reject uploads that are not of `expected` kind
    pub fn require(self, expected: FileKind) -> Result<Self> {
        let kind = self.kind();
        if kind == expected {
            Ok(self)
        } else {
            Err(Error::UnsupportedFileType(format!(
                "'{}' is not a {}",
                self.filename,
                match expected {
                    FileKind::Pdf => "PDF",
                    FileKind::Image => "supported image",
                    FileKind::Unknown => "known file type",
                }
            )))
        }
    }
}

/// Multipart extractor that hands its rejection to `read_upload`
pub type MultipartBody = std::result::Result<Multipart, MultipartRejection>;

/// Read the `file` field from a multipart body
///
/// Other fields are skipped. A request that is not multipart at all is
/// rejected as `Error::Multipart`, so clients get the JSON error body.
pub async fn read_upload(multipart: MultipartBody) -> Result<Upload> {
    let mut multipart = multipart.map_err(|rejection| Error::Multipart(rejection.body_text()))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Multipart(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        if filename.is_empty() {
            return Err(Error::EmptyFilename);
        }
        let content_type = field.content_type().map(str::to_string);

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Multipart(format!("Failed to read file: {}", e)))?;
        if data.is_empty() {
            return Err(Error::EmptyFile);
        }

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        return Ok(Upload {
            filename,
            content_type,
            data,
        });
    }

    Err(Error::MissingFile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_content_type() {
        assert_eq!(FileKind::classify(Some("application/pdf"), "blob"), FileKind::Pdf);
        assert_eq!(FileKind::classify(Some("image/png"), "blob"), FileKind::Image);
        assert_eq!(FileKind::classify(Some("IMAGE/JPEG; q=1"), "blob"), FileKind::Image);
    }

    #[test]
    fn test_content_type_wins_over_extension() {
        assert_eq!(FileKind::classify(Some("image/png"), "scan.pdf"), FileKind::Image);
    }

    #[test]
    fn test_generic_content_type_falls_back_to_extension() {
        assert_eq!(
            FileKind::classify(Some("application/octet-stream"), "Report.PDF"),
            FileKind::Pdf
        );
        assert_eq!(FileKind::classify(None, "photo.jpeg"), FileKind::Image);
        assert_eq!(FileKind::classify(None, "scan.tiff"), FileKind::Image);
        assert_eq!(FileKind::classify(None, "notes.txt"), FileKind::Unknown);
        assert_eq!(FileKind::classify(None, "no_extension"), FileKind::Unknown);
    }

    #[test]
    fn test_require() {
        let upload = Upload {
            filename: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::from_static(b"hi"),
        };
        let err = upload.clone().require(FileKind::Pdf).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert!(err.to_string().starts_with("Unsupported file type"));

        let pdf = Upload {
            filename: "a.pdf".to_string(),
            content_type: None,
            data: Bytes::from_static(b"%PDF"),
        };
        assert_eq!(pdf.require(FileKind::Pdf).unwrap().filename, "a.pdf");
    }
}
