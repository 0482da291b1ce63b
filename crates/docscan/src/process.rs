//! External tool invocation with a deadline
//!
//! Output is captured into anonymous temp files rather than pipes so a
//! chatty child cannot block on a full pipe while we poll it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default limit for a single tesseract, easyocr or pdftoppm run (2 minutes)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a tool run produced no output
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("failed to start: {0}")]
    Spawn(io::Error),

    #[error("timed out after {}s and was killed", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Run `cmd` to completion, killing it once `limit` has elapsed
pub fn output_with_deadline(mut cmd: Command, limit: Duration) -> Result<Output, ToolFailure> {
    let stdout = tempfile::tempfile()?;
    let stderr = tempfile::tempfile()?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout.try_clone()?))
        .stderr(Stdio::from(stderr.try_clone()?));

    let mut child = cmd.spawn().map_err(ToolFailure::Spawn)?;
    let deadline = Instant::now() + limit;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        let now = Instant::now();
        if now >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!("Failed to kill {:?}: {}", cmd.get_program(), e);
            }
            // Reap so the child does not linger as a zombie
            let _ = child.wait();
            tracing::warn!("{:?} killed after {:?}", cmd.get_program(), limit);
            return Err(ToolFailure::TimedOut(limit));
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    };

    Ok(Output {
        status,
        stdout: read_back(stdout)?,
        stderr: read_back(stderr)?,
    })
}

fn read_back(mut file: File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        let output = output_with_deadline(cmd, Duration::from_secs(10)).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }

    #[test]
    fn test_overrunning_tool_is_killed() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = output_with_deadline(cmd, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ToolFailure::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_binary_fails_to_start() {
        let cmd = Command::new("docscan-definitely-missing-binary");
        let err = output_with_deadline(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ToolFailure::Spawn(_)));
    }
}
