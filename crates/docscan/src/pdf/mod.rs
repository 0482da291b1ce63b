//! PDF access: page enumeration, embedded text, rasterisation
//!
//! - lopdf - page tree and text-layer extraction
//! - pdftoppm (poppler-utils) - page rendering for OCR

mod pipeline;

pub use pipeline::{ExtractionMethod, PagePipeline, PageResult, PdfExtraction};

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::process::{output_with_deadline, DEFAULT_TOOL_TIMEOUT};

/// A loaded PDF document
pub struct PdfDocument {
    doc: lopdf::Document,
    pages: Vec<u32>,
}

impl PdfDocument {
    /// Parse a PDF from memory
    pub fn load(data: &[u8]) -> Result<Self> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::pdf_parse(format!("Failed to load PDF: {}", e)))?;
        // BTreeMap keys are already in page order
        let pages = doc.get_pages().keys().copied().collect();
        Ok(Self { doc, pages })
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 1-based page numbers in document order
    pub fn page_numbers(&self) -> &[u32] {
        &self.pages
    }

    /// Embedded text of a page, `None` when absent or whitespace-only
    pub fn embedded_text(&self, page_number: u32) -> Option<String> {
        match self.doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("No text layer on page {}: {}", page_number, e);
                None
            }
        }
    }
}

/// Text-layer only extraction, no OCR
///
/// Concatenates each page's embedded text followed by a newline, skipping
/// pages without text, and trims the result.
pub fn extract_embedded_text(data: &[u8]) -> Result<String> {
    let pdf = PdfDocument::load(data)?;
    let mut text = String::new();
    for &page in pdf.page_numbers() {
        if let Some(page_text) = pdf.embedded_text(page) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    Ok(text.trim().to_string())
}

/// Renders a single PDF page to an encoded image
pub trait PageRasterizer: Send + Sync {
    /// Render `page_number` (1-based) of the PDF stored at `pdf_path`
    fn rasterize(&self, pdf_path: &Path, page_number: u32) -> Result<Vec<u8>>;
}

/// Page rendering via `pdftoppm`
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    dpi: u32,
    timeout: Duration,
}

impl Pdftoppm {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Kill a page render after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if pdftoppm is available
    pub fn is_available() -> bool {
        Command::new("pdftoppm")
            .arg("-v")
            .output()
            .map(|_| true) // pdftoppm -v writes to stderr, existence is enough
            .unwrap_or(false)
    }

    fn command(&self, pdf_path: &Path, page_number: u32, out_prefix: &Path) -> Command {
        let page = page_number.to_string();
        let mut cmd = Command::new("pdftoppm");
        cmd.args(["-png", "-singlefile"])
            .args(["-r", &self.dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .arg(pdf_path)
            .arg(out_prefix);
        cmd
    }
}

impl PageRasterizer for Pdftoppm {
    fn rasterize(&self, pdf_path: &Path, page_number: u32) -> Result<Vec<u8>> {
        let out_dir = tempfile::Builder::new().prefix("docscan-raster-").tempdir()?;
        let prefix = out_dir.path().join("page");

        let cmd = self.command(pdf_path, page_number, &prefix);
        let output = output_with_deadline(cmd, self.timeout).map_err(|e| {
            Error::rasterize(format!("pdftoppm on page {} {}", page_number, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::rasterize(format!(
                "pdftoppm error on page {}: {}",
                page_number,
                stderr.trim()
            )));
        }

        std::fs::read(prefix.with_extension("png")).map_err(|e| {
            Error::rasterize(format!("pdftoppm produced no image for page {}: {}", page_number, e))
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build an in-memory PDF; `Some(text)` pages carry a text layer, `None`
    /// pages only draw a filled rectangle (a stand-in for a scanned page)
    pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let operations = match page {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![
                    Operation::new("re", vec![72.into(), 72.into(), 200.into(), 100.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
