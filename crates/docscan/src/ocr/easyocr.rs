//! EasyOCR command-line engine

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{clean_output, run_on_temp_image, OcrEngine};
use crate::error::Result;
use crate::process::DEFAULT_TOOL_TIMEOUT;

/// OCR via the `easyocr` CLI, one recognized line per output line
#[derive(Debug, Clone)]
pub struct EasyOcrEngine {
    lang: String,
    gpu: bool,
    timeout: Duration,
}

impl EasyOcrEngine {
    pub fn new(lang: impl Into<String>, gpu: bool) -> Self {
        Self {
            lang: lang.into(),
            gpu,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Kill a recognition run after `timeout`; model loading counts against it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn uses_gpu(&self) -> bool {
        self.gpu
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new("easyocr");
        cmd.args(["-l", &self.lang])
            .arg("-f")
            .arg(image)
            .args(["--detail", "0"])
            .args(["--gpu", if self.gpu { "True" } else { "False" }]);
        cmd
    }
}

impl OcrEngine for EasyOcrEngine {
    fn name(&self) -> &'static str {
        "easyocr"
    }

    fn recognize(&self, png: &[u8]) -> Result<String> {
        let output = run_on_temp_image("easyocr", png, self.timeout, |path| self.command(path))?;
        let text = clean_output(&output.stdout);
        tracing::debug!("easyocr extracted {} characters (gpu: {})", text.len(), self.gpu);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_gpu_flag() {
        let args = |engine: &EasyOcrEngine| -> Vec<String> {
            engine
                .command(Path::new("in.png"))
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        };

        let gpu = EasyOcrEngine::new("en", true);
        assert!(gpu.uses_gpu());
        assert_eq!(args(&gpu), ["-l", "en", "-f", "in.png", "--detail", "0", "--gpu", "True"]);

        let cpu = EasyOcrEngine::new("en", false);
        assert_eq!(args(&cpu).last().map(String::as_str), Some("False"));
    }
}
