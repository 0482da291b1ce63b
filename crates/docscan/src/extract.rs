//! Extraction entry points shared by the HTTP handlers and the job worker

use std::sync::Arc;
use std::time::Duration;

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::ocr::{self, EngineInfo, OcrEngine};
use crate::pdf::{self, PagePipeline, PageRasterizer, PageResult, PdfExtraction, Pdftoppm};
use crate::preprocess::Preprocessor;

/// OCR engine, rasteriser and preprocessing settings bundled together
///
/// All methods are blocking; async callers go through `spawn_blocking`.
#[derive(Clone)]
pub struct Extractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
    preprocessor: Preprocessor,
}

impl Extractor {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn PageRasterizer>,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            ocr,
            rasterizer,
            preprocessor,
        }
    }

    /// Probe the system and build the production extractor
    pub fn from_config(config: &ExtractConfig) -> (Self, EngineInfo) {
        let (engine, info) = ocr::select_engine(&config.ocr);
        if !Pdftoppm::is_available() {
            tracing::warn!(
                "pdftoppm not found, scanned PDF pages will fail. Install with: apt install poppler-utils"
            );
        }
        let rasterizer = Pdftoppm::new(config.pdf.raster_dpi)
            .with_timeout(Duration::from_secs(config.pdf.render_timeout_secs));
        let extractor = Self::new(
            engine,
            Arc::new(rasterizer),
            Preprocessor::new(&config.preprocessing),
        );
        (extractor, info)
    }

    pub fn engine_name(&self) -> &'static str {
        self.ocr.name()
    }

    /// OCR an uploaded image
    pub fn extract_image(&self, data: &[u8]) -> Result<String> {
        let prepared = self.preprocessor.prepare(data)?;
        tracing::debug!("Prepared {}x{} image for OCR", prepared.width, prepared.height);
        let text = self.ocr.recognize(&prepared.png)?;
        Ok(text.trim().to_string())
    }

    /// Per-page PDF extraction with OCR fallback
    pub fn extract_pdf<F>(&self, data: &[u8], on_page: F) -> Result<PdfExtraction>
    where
        F: FnMut(&PageResult, usize, usize),
    {
        PagePipeline::new(self.ocr.as_ref(), self.rasterizer.as_ref(), &self.preprocessor)
            .run(data, on_page)
    }

    /// Text-layer only PDF extraction
    pub fn extract_pdf_text_layer(&self, data: &[u8]) -> Result<String> {
        pdf::extract_embedded_text(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ocr::MockOcrEngine;
    use crate::pdf::fixtures::build_pdf;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;

    struct NoRasterizer;

    impl PageRasterizer for NoRasterizer {
        fn rasterize(&self, _pdf_path: &Path, _page_number: u32) -> Result<Vec<u8>> {
            Err(Error::rasterize("unavailable"))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([200, 200, 200])))
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_extract_image_trims_engine_output() {
        let mut ocr = MockOcrEngine::new();
        ocr.expect_recognize()
            .withf(|png| image::load_from_memory(png).map(|i| i.width() == 20).unwrap_or(false))
            .times(1)
            .returning(|_| Ok("  receipt total 42  \n".to_string()));

        let extractor =
            Extractor::new(Arc::new(ocr), Arc::new(NoRasterizer), Preprocessor::default());
        assert_eq!(extractor.extract_image(&png_bytes()).unwrap(), "receipt total 42");
    }

    #[test]
    fn test_extract_image_rejects_empty_bytes() {
        let mut ocr = MockOcrEngine::new();
        ocr.expect_recognize().times(0);
        let extractor =
            Extractor::new(Arc::new(ocr), Arc::new(NoRasterizer), Preprocessor::default());

        let err = extractor.extract_image(&[]).unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
    }

    #[test]
    fn test_text_layer_path_never_runs_ocr() {
        let mut ocr = MockOcrEngine::new();
        ocr.expect_recognize().times(0);
        let extractor =
            Extractor::new(Arc::new(ocr), Arc::new(NoRasterizer), Preprocessor::default());

        let text = extractor
            .extract_pdf_text_layer(&build_pdf(&[None, Some("Layered")]))
            .unwrap();
        assert!(text.contains("Layered"));
    }
}
