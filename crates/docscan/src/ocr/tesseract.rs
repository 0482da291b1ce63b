//! Tesseract command-line engine

use std::process::Command;
use std::time::Duration;

use super::{clean_output, run_on_temp_image, OcrEngine};
use crate::error::Result;
use crate::process::DEFAULT_TOOL_TIMEOUT;

/// OCR via the `tesseract` binary
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    lang: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Kill a recognition run after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, image: &std::path::Path) -> Command {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image).arg("stdout").args(["-l", &self.lang]);
        cmd
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, png: &[u8]) -> Result<String> {
        let output = run_on_temp_image("tesseract", png, self.timeout, |path| self.command(path))?;
        let text = clean_output(&output.stdout);
        tracing::debug!("tesseract extracted {} characters", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_command_line() {
        let engine = TesseractEngine::new("eng+deu");
        let cmd = engine.command(Path::new("/tmp/page.png"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "tesseract");
        assert_eq!(args, ["/tmp/page.png", "stdout", "-l", "eng+deu"]);
    }

    #[test]
    fn test_timeout_defaults_and_overrides() {
        assert_eq!(TesseractEngine::new("eng").timeout(), DEFAULT_TOOL_TIMEOUT);
        let engine = TesseractEngine::new("eng").with_timeout(Duration::from_secs(5));
        assert_eq!(engine.timeout(), Duration::from_secs(5));
    }
}
