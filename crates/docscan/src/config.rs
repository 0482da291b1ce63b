//! Configuration for the extraction service

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// OCR engine configuration
    pub ocr: OcrConfig,
    /// Image preprocessing configuration
    pub preprocessing: PreprocessConfig,
    /// PDF handling configuration
    pub pdf: PdfConfig,
    /// Background job configuration
    pub jobs: JobsConfig,
}

impl ExtractConfig {
    /// Load configuration from an optional TOML file, then apply `DOCSCAN_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Override selected fields from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("DOCSCAN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCSCAN_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid DOCSCAN_PORT: {}", port),
            }
        }
        if let Some(engine) = lookup("DOCSCAN_OCR_ENGINE") {
            match engine.to_lowercase().as_str() {
                "auto" => self.ocr.engine = OcrEngineKind::Auto,
                "tesseract" => self.ocr.engine = OcrEngineKind::Tesseract,
                "easyocr" => self.ocr.engine = OcrEngineKind::EasyOcr,
                other => tracing::warn!("Ignoring unknown DOCSCAN_OCR_ENGINE: {}", other),
            }
        }
        if let Some(device) = lookup("DOCSCAN_OCR_DEVICE") {
            match device.to_lowercase().as_str() {
                "auto" => self.ocr.device = DeviceSelection::Auto,
                "gpu" => self.ocr.device = DeviceSelection::Gpu,
                "cpu" => self.ocr.device = DeviceSelection::Cpu,
                other => tracing::warn!("Ignoring unknown DOCSCAN_OCR_DEVICE: {}", other),
            }
        }
        if let Some(workers) = lookup("DOCSCAN_WORKERS") {
            match workers.parse() {
                Ok(n) => self.jobs.worker_count = Some(n),
                Err(_) => tracing::warn!("Ignoring invalid DOCSCAN_WORKERS: {}", workers),
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Which OCR engine to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// EasyOCR when installed, Tesseract otherwise
    #[default]
    Auto,
    Tesseract,
    #[serde(rename = "easyocr")]
    EasyOcr,
}

/// Compute device for engines that support it
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelection {
    /// Probe for a GPU at startup
    #[default]
    Auto,
    Gpu,
    Cpu,
}

/// OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngineKind,
    pub device: DeviceSelection,
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    pub tesseract_lang: String,
    /// EasyOCR language code, e.g. "en"
    pub easyocr_lang: String,
    /// Limit for a single engine run before it is killed
    pub command_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Auto,
            device: DeviceSelection::Auto,
            tesseract_lang: "eng".to_string(),
            easyocr_lang: "en".to_string(),
            command_timeout_secs: 120,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Apply CLAHE contrast enhancement
    pub enabled: bool,
    /// CLAHE clip limit
    pub clip_limit: f32,
    /// CLAHE tile grid (columns, rows)
    pub tile_grid: (u32, u32),
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clip_limit: 2.0,
            tile_grid: (8, 8),
        }
    }
}

/// PDF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Resolution used when rasterising pages for OCR
    pub raster_dpi: u32,
    /// Limit for rendering a single page before pdftoppm is killed
    pub render_timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            raster_dpi: 150,
            render_timeout_secs: 120,
        }
    }
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Number of concurrent jobs (default: CPU count, max 4)
    pub worker_count: Option<usize>,
    /// Maximum queued jobs before submissions are rejected
    pub queue_capacity: usize,
    /// Timeout for a single job in seconds
    pub job_timeout_secs: u64,
    /// How long finished jobs stay pollable
    pub result_ttl_secs: u64,
    /// Interval between eviction sweeps
    pub sweep_interval_secs: u64,
}

impl JobsConfig {
    /// Resolved worker count
    pub fn workers(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: 64,
            job_timeout_secs: 600, // 10 minutes
            result_ttl_secs: 3600, // 1 hour
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ExtractConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.preprocessing.clip_limit, 2.0);
        assert_eq!(config.preprocessing.tile_grid, (8, 8));
        assert_eq!(config.ocr.engine, OcrEngineKind::Auto);
        assert_eq!(config.ocr.command_timeout_secs, 120);
        assert_eq!(config.pdf.render_timeout_secs, 120);
        assert!(config.jobs.workers() >= 1);
    }

    #[test]
    fn test_partial_toml() {
        let config = ExtractConfig::from_toml(
            r#"
            [server]
            port = 8081

            [ocr]
            engine = "easyocr"
            device = "cpu"
            command_timeout_secs = 30

            [jobs]
            worker_count = 2
            queue_capacity = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.ocr.engine, OcrEngineKind::EasyOcr);
        assert_eq!(config.ocr.device, DeviceSelection::Cpu);
        assert_eq!(config.ocr.tesseract_lang, "eng");
        assert_eq!(config.ocr.command_timeout_secs, 30);
        assert_eq!(config.pdf.render_timeout_secs, 120);
        assert_eq!(config.jobs.workers(), 2);
        assert_eq!(config.jobs.queue_capacity, 5);
        assert_eq!(config.jobs.result_ttl_secs, 3600);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ExtractConfig::from_toml("[server]\nport = \"nope\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCSCAN_PORT", "9000"),
            ("DOCSCAN_OCR_ENGINE", "Tesseract"),
            ("DOCSCAN_OCR_DEVICE", "bogus"),
        ]
        .into_iter()
        .collect();

        let mut config = ExtractConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.ocr.engine, OcrEngineKind::Tesseract);
        assert_eq!(config.ocr.device, DeviceSelection::Auto);
    }
}
