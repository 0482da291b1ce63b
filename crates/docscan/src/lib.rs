//! docscan: text extraction from uploaded images and PDFs
//!
//! Images are converted to grayscale, contrast-enhanced with CLAHE and sent
//! to an external OCR engine (EasyOCR or Tesseract). PDFs are processed page
//! by page in the background: pages with a text layer are read directly,
//! the rest are rendered and OCR'd. Clients poll job progress over HTTP.

pub mod config;
pub mod error;
pub mod extract;
pub mod intake;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod process;
pub mod processing;
pub mod server;

pub use config::ExtractConfig;
pub use error::{Error, Result};
pub use extract::Extractor;
pub use pdf::{ExtractionMethod, PageResult, PdfExtraction};
pub use processing::{JobPoll, JobRegistry, JobStatus};
pub use server::DocscanServer;
