use anyhow::{Context, Result};
use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::audio::{self, AudioStream, ChunkSpan};
use crate::cache::ChunkCache;

pub mod speech;

use speech::{recognize_with_retry, RetryConfig, SpeechApi};

/// Main transcription pipeline: encodes chunk spans to WAV, sends them to the
/// speech service concurrently, and caches every artifact so an interrupted
/// run resumes where it stopped.
pub struct TranscriptionPipeline {
    speech: Arc<dyn SpeechApi>,
    cache: ChunkCache,
    retry: RetryConfig,
    limiter: Arc<Semaphore>,
    quiet: bool,
}

impl TranscriptionPipeline {
    pub fn new(
        speech: Arc<dyn SpeechApi>,
        cache: ChunkCache,
        retry: RetryConfig,
        limiter: Arc<Semaphore>,
        quiet: bool,
    ) -> Self {
        Self { speech, cache, retry, limiter, quiet }
    }

    /// Transcribe every span of `audio`, returning one entry per span in span
    /// order. `None` entries are chunks the service had no transcript for.
    ///
    /// All chunks run concurrently, bounded by the shared semaphore. If any
    /// chunk fails the remaining chunks still finish (and cache their
    /// results) before the first error is returned.
    pub async fn run(
        &self,
        audio: &AudioStream,
        spans: &[ChunkSpan],
    ) -> Result<Vec<Option<String>>> {
        self.cache.ensure_layout()?;

        let progress = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(spans.len() as u64)
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
        );
        progress.set_message("Transcribing chunks...");

        let tasks = spans
            .iter()
            .map(|span| self.process_chunk(audio, *span, &progress));
        let results = join_all(tasks).await;

        progress.finish_with_message("Transcription complete");

        results.into_iter().collect()
    }

    /// Handle one chunk end to end: cut and encode the WAV (unless cached),
    /// obtain its transcript (from cache or the service), and persist both.
    async fn process_chunk(
        &self,
        audio: &AudioStream,
        span: ChunkSpan,
        progress: &ProgressBar,
    ) -> Result<Option<String>> {
        if !self.cache.has_audio(span.index) {
            let samples = audio.slice_ms(span.start_ms, span.length_ms);
            let wav = audio::encode_wav(samples, audio.sample_rate())?;
            self.cache
                .write_audio(span.index, &wav)
                .with_context(|| format!("failed to cache audio for chunk {}", span.index))?;
        }

        let wav = self.cache.read_audio(span.index)?;

        let transcript = if self.cache.has_transcript(span.index) {
            tracing::debug!("Using cached transcript for chunk {}", span.index);
            self.cache.read_transcript(span.index)?
        } else {
            let _permit = self.limiter.acquire().await?;

            tracing::info!(
                "Transcribing chunk {} ({}ms at {}ms)",
                span.index,
                span.length_ms,
                span.start_ms
            );
            let label = format!("chunk {}", span.index);
            let transcript = recognize_with_retry(
                self.speech.as_ref(),
                &label,
                &wav,
                &self.retry,
            )
            .await?;

            self.cache.write_transcript(span.index, transcript.as_deref())?;
            transcript
        };

        progress.inc(1);

        Ok(transcript)
    }
}
