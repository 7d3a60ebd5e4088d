//! Video URL handling and audio download via yt-dlp.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

/// Matches the 11-character video id in the URL forms YouTube uses
/// (`watch?v=`, `youtu.be/`, `/embed/`). The final character of an id is
/// constrained because ids are base64-encoded 64-bit integers.
const VIDEO_ID_PATTERN: &str = r"(?:v=|/)([0-9A-Za-z_-]{10}[048AEIMQUYcgkosw])";

/// Pull the video id out of a watch URL.
pub fn extract_video_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("invalid video URL: {url}"))?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        bail!("unsupported URL scheme: {scheme}");
    }

    let pattern = Regex::new(VIDEO_ID_PATTERN).context("invalid video id pattern")?;
    let captures = pattern
        .captures(url)
        .with_context(|| format!("could not find a video id in URL: {url}"))?;

    Ok(captures[1].to_string())
}

/// Metadata reported by yt-dlp before downloading.
#[derive(Debug, Clone)]
pub struct VideoProbe {
    pub title: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Audio downloader backed by the yt-dlp binary.
pub struct AudioFetcher {
    yt_dlp_path: String,
}

impl AudioFetcher {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Where the downloaded audio for a video lives under the working root.
    pub fn audio_path(root: &Path, video_id: &str) -> PathBuf {
        root.join("audio_files").join(format!("{video_id}.mp3"))
    }

    /// Fetch video metadata without downloading anything.
    pub async fn probe(&self, url: &str) -> Result<VideoProbe> {
        tracing::debug!("Probing video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            bail!("yt-dlp failed: {}", error);
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .context("failed to parse yt-dlp video info")?;

        Ok(VideoProbe {
            title: info["title"].as_str().map(|s| s.to_string()),
            duration_secs: info["duration"].as_f64(),
        })
    }

    /// Download the audio track of `url` to `dest` as MP3. A file already at
    /// `dest` is reused so reruns never touch the network.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        if dest.exists() {
            tracing::info!("Audio already downloaded: {}", dest.display());
            return Ok(());
        }

        if let Some(parent) = dest.parent() {
            fs_err::create_dir_all(parent)?;
        }

        tracing::info!("Downloading audio for: {}", url);

        // yt-dlp substitutes the real extension while downloading, then the
        // mp3 post-processing step leaves the file at `dest`.
        let template = dest.with_extension("%(ext)s");
        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &template.to_string_lossy(),
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--no-playlist",
                "--newline",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            bail!("failed to download audio: {}", error);
        }

        if !dest.exists() {
            bail!(
                "yt-dlp finished but produced no file at {}",
                dest.display()
            );
        }

        Ok(())
    }
}

impl Default for AudioFetcher {
    fn default() -> Self {
        Self::new()
    }
}
