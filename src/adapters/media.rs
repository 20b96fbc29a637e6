//! Audio playback through external binaries.
//!
//! Each call is downloaded into its own temporary directory, converted to MP3
//! with `ffmpeg`, measured with `ffprobe` and played with `mpg123`. The
//! directory is removed when the call is done, whichever way it ends.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::AudioPlayer;
use crate::config::MediaSettings;
use crate::domain::Call;

/// Failures while turning a call into sound
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Call has no audio URL")]
    MissingUrl,

    #[error("Error downloading file: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Download returned HTTP {0}")]
    DownloadStatus(reqwest::StatusCode),

    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with code {code}: {stderr}")]
    Exit {
        binary: String,
        code: i32,
        stderr: String,
    },

    #[error("Error parsing track length '{0}'")]
    Duration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prefix of the per-call working directories
const WORKDIR_PREFIX: &str = "call-";

/// Upper bound on fetching one recording
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Plays calls with ffmpeg + ffprobe + mpg123
pub struct MediaPlayer {
    settings: MediaSettings,
    download_dir: PathBuf,
    client: reqwest::Client,
}

impl MediaPlayer {
    pub fn new(
        settings: MediaSettings,
        download_dir: impl Into<PathBuf>,
    ) -> Result<Self, MediaError> {
        Self::with_download_timeout(settings, download_dir, DOWNLOAD_TIMEOUT)
    }

    pub fn with_download_timeout(
        settings: MediaSettings,
        download_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            settings,
            download_dir: download_dir.into(),
            client,
        })
    }

    /// Create the download directory and remove call directories left behind
    /// by a previous run. Anything else in the directory is left alone.
    pub async fn prepare_download_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create audio directory: {}",
                    self.download_dir.display()
                )
            })?;

        let mut entries = tokio::fs::read_dir(&self.download_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to read audio directory: {}",
                    self.download_dir.display()
                )
            })?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(WORKDIR_PREFIX) {
                continue;
            }
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let path = entry.path();
            debug!(path = %path.display(), "Removing leftover call directory");
            tokio::fs::remove_dir_all(&path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }

        Ok(())
    }

    /// Warn about any binary that cannot be started
    pub async fn check_binaries(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for (binary, arg) in [
            (&self.settings.ffmpeg, "-version"),
            (&self.settings.ffprobe, "-version"),
            (&self.settings.mpg123, "--version"),
        ] {
            let ok = Command::new(binary)
                .arg(arg)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);

            if !ok {
                warn!("{} does not appear to be installed; playback will fail", binary);
                missing.push(binary.clone());
            }
        }
        missing
    }

    /// Stream `url` into `dest`
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, MediaError> {
        if url.is_empty() {
            return Err(MediaError::MissingUrl);
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MediaError::DownloadStatus(response.status()));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            match total {
                Some(total) => debug!("Downloaded {}/{} bytes", downloaded, total),
                None => debug!("Downloaded {} bytes", downloaded),
            }
        }
        file.flush().await?;

        Ok(downloaded)
    }

    async fn convert_to_mp3(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let mut command = Command::new(&self.settings.ffmpeg);
        command
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input)
            .arg(output);

        run(&mut command, &self.settings.ffmpeg).await?;
        Ok(())
    }

    async fn track_length(&self, path: &Path) -> Result<f64, MediaError> {
        let mut command = Command::new(&self.settings.ffprobe);
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path);

        let stdout = run(&mut command, &self.settings.ffprobe).await?;
        parse_duration(&stdout)
    }

    async fn play_file(&self, path: &Path) -> Result<(), MediaError> {
        let mut command = Command::new(&self.settings.mpg123);
        command.arg("-q").arg(path);

        run(&mut command, &self.settings.mpg123).await?;
        Ok(())
    }
}

#[async_trait]
impl AudioPlayer for MediaPlayer {
    #[instrument(skip(self, call), fields(call_id = %call.id))]
    async fn play(&self, call: &Call) -> Result<()> {
        // Dropped on every return path, taking the downloaded files with it.
        let workdir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(&self.download_dir)
            .with_context(|| {
                format!(
                    "Failed to create temp dir in {}",
                    self.download_dir.display()
                )
            })?;

        let source_path = workdir.path().join(call.local_file_name());
        let mp3_path = source_path.with_extension("mp3");
        // Source may already be an mp3; keep the two paths distinct.
        let mp3_path = if mp3_path == source_path {
            workdir.path().join("converted.mp3")
        } else {
            mp3_path
        };

        let bytes = self
            .download(&call.url, &source_path)
            .await
            .context("Failed to download file")?;
        debug!(bytes, path = %source_path.display(), "Download complete");

        self.convert_to_mp3(&source_path, &mp3_path)
            .await
            .context("Failed to convert file to MP3")?;

        let length = self
            .track_length(&mp3_path)
            .await
            .context("Failed to get track length")?;
        info!("Track length: {:.2} seconds", length);

        self.play_file(&mp3_path)
            .await
            .context("Failed to play file")?;

        if let Err(e) = workdir.close() {
            warn!("Failed to delete downloaded files: {}", e);
        }

        Ok(())
    }
}

/// Run a binary to completion, returning its stdout
async fn run(command: &mut Command, binary: &str) -> Result<String, MediaError> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Exit {
            binary: binary.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_duration(stdout: &str) -> Result<f64, MediaError> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::Duration(trimmed.to_string()))
}
