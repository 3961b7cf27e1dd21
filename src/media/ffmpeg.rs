use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::{AnalyzerError, Result};

/// Converts a recording into an upload-friendly container
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Fail fast when the underlying tool is not installed
    fn ensure_available(&self) -> Result<()>;

    /// Transcode `input` into `output`, overwriting it
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg based transcoder producing H.264/AAC MP4 with the moov atom up front
pub struct FfmpegTranscoder {
    binary_path: String,
}

impl FfmpegTranscoder {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    fn transcode_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn ensure_available(&self) -> Result<()> {
        which::which(&self.binary_path).map(|_| ()).map_err(|_| {
            AnalyzerError::Tooling(format!(
                "{} is required to transcode webm recordings for upload",
                self.binary_path
            ))
        })
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let args = Self::transcode_args(input, output);
        tracing::debug!("Executing {} {:?}", self.binary_path, args);

        let result = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AnalyzerError::Tooling(format!("Failed to execute {}: {}", self.binary_path, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AnalyzerError::Tooling(format!(
                "ffmpeg failed to transcode recording ({}): {}",
                result.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
