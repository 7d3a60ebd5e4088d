use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::Result;

/// Marker persisted for chunks the speech service produced no text for,
/// distinct from an empty transcript file.
pub const NO_TRANSCRIPT_SENTINEL: &str = "<<no transcript>>";

/// Writes `bytes` through a temp file in the same directory, then renames it
/// into place, so a concurrent or later reader never observes a partially
/// written artifact. Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid artifact path: {}", path.display()))?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs_err::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs_err::rename(&tmp, path)
        .with_context(|| format!("failed to publish {}", path.display()))?;

    Ok(())
}

/// On-disk cache of per-chunk artifacts for one video, keyed by
/// `(video_id, chunk_index, stage)`. Re-runs over the same video find their
/// finished chunks here and skip the corresponding work.
pub struct ChunkCache {
    dir: PathBuf,
    video_id: String,
}

impl ChunkCache {
    pub fn new(working_root: &Path, video_id: &str) -> Self {
        Self {
            dir: working_root.join("audio_files").join(video_id),
            video_id: video_id.to_string(),
        }
    }

    pub fn ensure_layout(&self) -> Result<()> {
        fs_err::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Canonical decoded source audio for this video.
    pub fn source_wav_path(&self) -> PathBuf {
        self.dir.join(format!("{}_source.wav", self.video_id))
    }

    pub fn audio_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{}_chunk_{}.wav", self.video_id, index))
    }

    pub fn transcript_path(&self, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}_chunk_{}_transcript.txt", self.video_id, index))
    }

    pub fn has_audio(&self, index: u32) -> bool {
        self.audio_path(index).exists()
    }

    pub fn has_transcript(&self, index: u32) -> bool {
        self.transcript_path(index).exists()
    }

    pub fn write_audio(&self, index: u32, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.audio_path(index), bytes)
    }

    pub fn read_audio(&self, index: u32) -> Result<Vec<u8>> {
        let path = self.audio_path(index);
        let bytes = fs_err::read(&path)
            .with_context(|| format!("failed to read chunk audio {}", path.display()))?;
        Ok(bytes)
    }

    /// Persists a transcript, writing the sentinel for `None` so that a later
    /// run can tell "transcribed, no speech" apart from "not yet transcribed".
    pub fn write_transcript(&self, index: u32, transcript: Option<&str>) -> Result<()> {
        let content = transcript.unwrap_or(NO_TRANSCRIPT_SENTINEL);
        write_atomic(&self.transcript_path(index), content.as_bytes())
    }

    pub fn read_transcript(&self, index: u32) -> Result<Option<String>> {
        let path = self.transcript_path(index);
        let content = fs_err::read_to_string(&path)
            .with_context(|| format!("failed to read cached transcript {}", path.display()))?;

        if content == NO_TRANSCRIPT_SENTINEL {
            Ok(None)
        } else {
            Ok(Some(content))
        }
    }
}
