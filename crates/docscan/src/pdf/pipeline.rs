//! Per-page PDF extraction with OCR fallback
//!
//! Pages are processed strictly in order. A page with a usable text layer
//! is taken as-is; any other page is rendered, preprocessed and sent to the
//! OCR engine. OCR failures are recorded on the page and never abort the
//! document.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::{PageRasterizer, PdfDocument};
use crate::error::{Error, Result};
use crate::ocr::OcrEngine;
use crate::preprocess::Preprocessor;

/// How a page's text was obtained
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Embedded text layer
    Text,
    /// Rendered and recognized
    #[serde(rename = "OCR")]
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Text => f.write_str("Text"),
            ExtractionMethod::Ocr => f.write_str("OCR"),
        }
    }
}

/// Extraction result for one page
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// 1-based page number
    pub page_number: u32,
    pub method: ExtractionMethod,
    pub text: String,
    /// Set when rendering or OCR failed; `text` then holds the message
    pub error: Option<String>,
}

impl PageResult {
    /// Page header plus text, as it appears in the combined output
    pub fn section(&self) -> String {
        format!(
            "--- Page {} ({}) ---\n{}\n",
            self.page_number,
            self.method,
            self.text.trim_end()
        )
    }
}

/// Extraction result for a whole document
#[derive(Debug, Clone, Default, Serialize)]
pub struct PdfExtraction {
    pub pages: Vec<PageResult>,
}

impl PdfExtraction {
    /// All page sections concatenated in page order
    pub fn text(&self) -> String {
        self.pages.iter().map(PageResult::section).collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages whose OCR failed
    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.error.is_some()).count()
    }
}

/// PDF bytes written to disk on first use, for tools that need a path
struct SpooledPdf<'a> {
    data: &'a [u8],
    file: Option<NamedTempFile>,
}

impl<'a> SpooledPdf<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, file: None }
    }

    fn path(&mut self) -> Result<&Path> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("docscan-pdf-")
                    .suffix(".pdf")
                    .tempfile()?;
                file.write_all(self.data)?;
                file.flush()?;
                file
            }
        };
        Ok(self.file.insert(file).path())
    }
}

/// Embedded-text-first page pipeline
pub struct PagePipeline<'a> {
    ocr: &'a dyn OcrEngine,
    rasterizer: &'a dyn PageRasterizer,
    preprocessor: &'a Preprocessor,
}

impl<'a> PagePipeline<'a> {
    pub fn new(
        ocr: &'a dyn OcrEngine,
        rasterizer: &'a dyn PageRasterizer,
        preprocessor: &'a Preprocessor,
    ) -> Self {
        Self {
            ocr,
            rasterizer,
            preprocessor,
        }
    }

    /// Extract every page of `data`
    ///
    /// `on_page(page, pages_done, total_pages)` runs after each page. Only a
    /// document that cannot be loaded returns an error.
    pub fn run<F>(&self, data: &[u8], mut on_page: F) -> Result<PdfExtraction>
    where
        F: FnMut(&PageResult, usize, usize),
    {
        let pdf = PdfDocument::load(data)?;
        let total = pdf.page_count();
        let mut spool = SpooledPdf::new(data);
        let mut extraction = PdfExtraction {
            pages: Vec::with_capacity(total),
        };

        tracing::info!("Extracting {} pages", total);

        for (index, &page_number) in pdf.page_numbers().iter().enumerate() {
            let page = match pdf.embedded_text(page_number) {
                Some(text) => {
                    tracing::debug!(
                        "Page {}: using embedded text ({} chars)",
                        page_number,
                        text.len()
                    );
                    PageResult {
                        page_number,
                        method: ExtractionMethod::Text,
                        text,
                        error: None,
                    }
                }
                None => self.ocr_page(&mut spool, page_number),
            };

            on_page(&page, index + 1, total);
            extraction.pages.push(page);
        }

        if extraction.failed_pages() > 0 {
            tracing::warn!(
                "{} of {} pages failed OCR",
                extraction.failed_pages(),
                total
            );
        }

        Ok(extraction)
    }

    fn ocr_page(&self, spool: &mut SpooledPdf<'_>, page_number: u32) -> PageResult {
        let result = spool
            .path()
            .and_then(|path| self.rasterizer.rasterize(path, page_number))
            .and_then(|image| self.preprocessor.prepare(&image))
            .and_then(|prepared| self.ocr.recognize(&prepared.png));

        match result {
            Ok(text) => {
                tracing::debug!("Page {}: OCR extracted {} chars", page_number, text.len());
                PageResult {
                    page_number,
                    method: ExtractionMethod::Ocr,
                    text,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Page {}: OCR failed: {}", page_number, e);
                // Engine errors already carry the "OCR error" prefix
                let detail = match &e {
                    Error::Ocr(message) => message.clone(),
                    other => other.to_string(),
                };
                PageResult {
                    page_number,
                    method: ExtractionMethod::Ocr,
                    text: format!("[OCR error: {}]", detail),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
