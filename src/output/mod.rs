use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cache;
use crate::correct::FinalDocument;

/// Join per-chunk transcripts into the combined raw transcript. Chunks the
/// service had nothing for are skipped; every included chunk is followed by a
/// blank line.
pub fn combine_transcripts(transcripts: &[Option<String>]) -> String {
    let mut out = String::new();
    for transcript in transcripts.iter().flatten() {
        if transcript.is_empty() {
            continue;
        }
        out.push_str(transcript);
        out.push_str("\n\n");
    }
    out
}

fn transcriptions_dir(root: &Path) -> PathBuf {
    root.join("transcriptions")
}

/// Path of the combined raw transcript for a video.
pub fn transcript_path(root: &Path, video_id: &str) -> PathBuf {
    transcriptions_dir(root).join(format!("{video_id}_transcript.txt"))
}

/// Path of the corrected transcript document for a video.
pub fn corrected_transcript_path(root: &Path, video_id: &str) -> PathBuf {
    transcriptions_dir(root).join(format!("{video_id}_corrected_transcript.txt"))
}

/// Path of the run metadata JSON for a video.
pub fn run_metadata_path(root: &Path, video_id: &str) -> PathBuf {
    transcriptions_dir(root).join(format!("{video_id}_run.json"))
}

/// Write a text artifact atomically so an interrupted run cannot leave a
/// half-written transcript behind.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    cache::write_atomic(path, content.as_bytes())
}

pub fn save_final_document(path: &Path, document: &FinalDocument) -> Result<()> {
    write_text(path, &document.render())
}

/// Summary of a completed run, written next to the transcripts.
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub video_id: String,
    pub title: Option<String>,
    pub audio_duration_secs: f64,
    pub chunk_count: usize,
    pub correction_chunk_count: usize,
    pub completed_at: DateTime<Utc>,
}

pub fn save_run_metadata(path: &Path, metadata: &RunMetadata) -> Result<()> {
    let json =
        serde_json::to_string_pretty(metadata).context("failed to serialize run metadata")?;
    cache::write_atomic(path, json.as_bytes())
}
