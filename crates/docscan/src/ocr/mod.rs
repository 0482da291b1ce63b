//! OCR engines and startup engine selection
//!
//! Recognition is delegated to external command-line engines:
//! - tesseract - CPU engine, always the fallback
//! - easyocr - preferred when installed, runs on GPU when one is detected

mod easyocr;
mod tesseract;

pub use easyocr::EasyOcrEngine;
pub use tesseract::TesseractEngine;

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DeviceSelection, OcrConfig, OcrEngineKind};
use crate::error::{Error, Result};
use crate::process::output_with_deadline;

/// Text recognition over a single encoded image
#[cfg_attr(test, mockall::automock)]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs and API info
    fn name(&self) -> &'static str;

    /// Recognize text in a PNG-encoded image
    fn recognize(&self, png: &[u8]) -> Result<String>;
}

/// Compute device an engine runs on
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Gpu,
    Cpu,
}

/// Result of startup engine selection
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub engine: &'static str,
    pub device: Device,
    /// Whether the engine binary responded to a version probe
    pub available: bool,
}

/// Check if tesseract is installed
pub fn has_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check if the easyocr CLI is installed
pub fn has_easyocr() -> bool {
    Command::new("easyocr")
        .arg("--help")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check for a usable NVIDIA GPU
pub fn has_gpu() -> bool {
    Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .map(|o| o.status.success() && !o.stdout.is_empty())
        .unwrap_or(false)
}

/// Pick the OCR engine for this process
pub fn select_engine(config: &OcrConfig) -> (Arc<dyn OcrEngine>, EngineInfo) {
    let timeout = Duration::from_secs(config.command_timeout_secs);
    let kind = match config.engine {
        OcrEngineKind::Auto if has_easyocr() => OcrEngineKind::EasyOcr,
        OcrEngineKind::Auto => OcrEngineKind::Tesseract,
        explicit => explicit,
    };

    match kind {
        OcrEngineKind::EasyOcr => {
            let device = match config.device {
                DeviceSelection::Gpu => Device::Gpu,
                DeviceSelection::Cpu => Device::Cpu,
                DeviceSelection::Auto if has_gpu() => Device::Gpu,
                DeviceSelection::Auto => Device::Cpu,
            };
            let available = has_easyocr();
            let engine = EasyOcrEngine::new(config.easyocr_lang.clone(), device == Device::Gpu)
                .with_timeout(timeout);
            tracing::info!("OCR engine: easyocr on {:?} (available: {})", device, available);
            if !available {
                tracing::warn!("easyocr not found. Install with: pip install easyocr");
            }
            let info = EngineInfo {
                engine: "easyocr",
                device,
                available,
            };
            (Arc::new(engine), info)
        }
        _ => {
            let available = has_tesseract();
            if config.device == DeviceSelection::Gpu {
                tracing::warn!("tesseract does not use the GPU, running on CPU");
            }
            tracing::info!("OCR engine: tesseract on CPU (available: {})", available);
            if !available {
                tracing::warn!("tesseract not found. Install with: apt install tesseract-ocr");
            }
            let engine = TesseractEngine::new(config.tesseract_lang.clone())
                .with_timeout(timeout);
            let info = EngineInfo {
                engine: "tesseract",
                device: Device::Cpu,
                available,
            };
            (Arc::new(engine), info)
        }
    }
}

/// Write image bytes to a temp file and run an engine command against it
///
/// `build` receives the image path and returns the command to run. The
/// engine is killed once `limit` elapses.
pub(crate) fn run_on_temp_image(
    engine: &str,
    png: &[u8],
    limit: Duration,
    build: impl FnOnce(&Path) -> Command,
) -> Result<Output> {
    let mut file = tempfile::Builder::new()
        .prefix("docscan-ocr-")
        .suffix(".png")
        .tempfile()?;
    file.write_all(png)?;
    file.flush()?;

    let output = output_with_deadline(build(file.path()), limit)
        .map_err(|e| Error::ocr(format!("{} {}", engine, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ocr(format!("{} error: {}", engine, stderr.trim())));
    }

    Ok(output)
}

/// Normalize engine stdout: strip page feeds, trim line ends, drop blank lines
pub(crate) fn clean_output(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| l.trim_matches('\x0c').trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output() {
        let raw = b"  Hello  \n\n\x0cWorld\r\n   \n";
        assert_eq!(clean_output(raw), "  Hello\nWorld");
    }

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let err = run_on_temp_image("nope", b"png", Duration::from_secs(1), |path| {
            let mut cmd = Command::new("docscan-definitely-missing-binary");
            cmd.arg(path);
            cmd
        })
        .unwrap_err();
        assert!(matches!(err, Error::Ocr(_)));
        assert!(err.to_string().contains("nope failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_engine_is_killed_at_deadline() {
        let started = std::time::Instant::now();
        let err = run_on_temp_image("sleepy", b"png", Duration::from_millis(100), |_| {
            let mut cmd = Command::new("sleep");
            cmd.arg("5");
            cmd
        })
        .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(matches!(err, Error::Ocr(ref msg) if msg.starts_with("sleepy timed out")));
    }

    #[test]
    fn test_explicit_tesseract_selection() {
        let config = OcrConfig {
            engine: OcrEngineKind::Tesseract,
            device: DeviceSelection::Gpu,
            ..Default::default()
        };
        let (engine, info) = select_engine(&config);
        assert_eq!(engine.name(), "tesseract");
        assert_eq!(info.engine, "tesseract");
        assert_eq!(info.device, Device::Cpu);
    }

    #[test]
    fn test_explicit_easyocr_device() {
        let config = OcrConfig {
            engine: OcrEngineKind::EasyOcr,
            device: DeviceSelection::Cpu,
            ..Default::default()
        };
        let (engine, info) = select_engine(&config);
        assert_eq!(engine.name(), "easyocr");
        assert_eq!(info.device, Device::Cpu);
    }
}
