//! External encoder driver

use async_trait::async_trait;
use cadence_core::models::Quality;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to launch encoder {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Encoder timed out after {0:?}")]
    Timeout(Duration),

    #[error("Encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One encode: `input` rendered with `codec` at `bitrate_kbps` into `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub codec: String,
    pub bitrate_kbps: i32,
}

impl TranscodeJob {
    pub fn for_quality(input: impl Into<PathBuf>, output: impl Into<PathBuf>, quality: &Quality) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            codec: quality.codec.clone(),
            bitrate_kbps: quality.bitrate,
        }
    }
}

/// Produces one rendition per call. Implementations must not return until the
/// output file is complete.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError>;
}

/// Runs `ffmpeg` (or a compatible binary) as a subprocess.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    /// `-i <input> -acodec <codec> -ab <bitrate>000 -y <output>`
    pub fn build_args(job: &TranscodeJob) -> Vec<String> {
        vec![
            "-i".to_string(),
            path_arg(&job.input),
            "-acodec".to_string(),
            job.codec.clone(),
            "-ab".to_string(),
            format!("{}000", job.bitrate_kbps),
            "-y".to_string(),
            path_arg(&job.output),
        ]
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[async_trait]
impl Encoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self, job), fields(codec = %job.codec, bitrate = job.bitrate_kbps))]
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        let args = Self::build_args(job);
        let start = Instant::now();

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Launch {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        // stdout is drained on its own task so a chatty encoder cannot fill the
        // pipe while we block on stderr.
        let stdout = child.stdout.take();
        let drain = tokio::spawn(async move {
            if let Some(mut stdout) = stdout {
                let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
            }
        });

        let mut stderr = child.stderr.take();
        let run = async {
            let mut captured = Vec::new();
            if let Some(stderr) = stderr.as_mut() {
                stderr.read_to_end(&mut captured).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, captured))
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;

        let (status, captured) = match outcome {
            Ok(result) => {
                let _ = drain.await;
                result?
            }
            Err(_) => {
                drain.abort();
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed out encoder");
                }
                tracing::error!(
                    input = %job.input.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Encoder timed out"
                );
                return Err(TranscodeError::Timeout(self.timeout));
            }
        };

        let stderr = String::from_utf8_lossy(&captured).trim().to_string();

        if !status.success() {
            tracing::error!(
                status = %status,
                input = %job.input.display(),
                stderr = %stderr,
                "Encoder failed"
            );
            return Err(TranscodeError::Failed {
                status: status.to_string(),
                stderr,
            });
        }

        if !tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
            return Err(TranscodeError::Failed {
                status: status.to_string(),
                stderr: format!("no output written to {}", job.output.display()),
            });
        }

        tracing::debug!(
            output = %job.output.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            stderr = %stderr,
            "Encoder finished"
        );

        Ok(())
    }
}
