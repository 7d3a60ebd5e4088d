use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cleanscribe::audio::AudioStream;
use cleanscribe::cache::ChunkCache;
use cleanscribe::cli::Cli;
use cleanscribe::config::Config;
use cleanscribe::correct::llm::CompletionClient;
use cleanscribe::correct::prompts::PromptSet;
use cleanscribe::correct::CorrectionPipeline;
use cleanscribe::fetch::{self, AudioFetcher};
use cleanscribe::output::{self, RunMetadata};
use cleanscribe::transcribe::speech::SpeechClient;
use cleanscribe::transcribe::TranscriptionPipeline;
use cleanscribe::{audio, utils};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cleanscribe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let Some(url) = cli.url.clone() else {
        eprintln!("Usage: cleanscribe [OPTIONS] <URL>");
        eprintln!("Run 'cleanscribe --help' for the full option list.");
        std::process::exit(1);
    };

    let video_id = match fetch::extract_video_id(&url) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("Error: {err:#}");
            eprintln!("Usage: cleanscribe [OPTIONS] <URL>");
            std::process::exit(1);
        }
    };

    // Warn about missing external tools up front; both are needed before any
    // network call is made.
    let missing_deps = utils::check_dependencies().await;
    for dep in &missing_deps {
        tracing::warn!("missing external tool: {}", dep);
    }

    let mut config = Config::load(cli.config.as_deref()).await?;
    config.apply_overrides(&cli);
    config.validate()?;

    // Credentials are startup-fatal: resolve both keys before any work.
    let speech_key = config.speech.resolve_api_key()?;
    let correction_key = config.correction.resolve_api_key()?;

    let root = config.working_root();
    tracing::info!("Processing video {} under {}", video_id, root.display());

    let fetcher = AudioFetcher::new();
    let probe_title = match fetcher.probe(&url).await {
        Ok(probe) => {
            if let Some(title) = &probe.title {
                tracing::info!("Title: {}", title);
            }
            if let Some(secs) = probe.duration_secs {
                tracing::info!("Duration: {}", utils::format_duration(secs));
            }
            probe.title
        }
        Err(err) => {
            tracing::warn!("video probe failed: {err:#}");
            None
        }
    };

    let audio_path = AudioFetcher::audio_path(&root, &video_id);
    fetcher.download(&url, &audio_path).await?;

    let cache = ChunkCache::new(&root, &video_id);
    cache.ensure_layout()?;
    let stream = AudioStream::load(&audio_path, &cache.source_wav_path()).await?;
    let duration_secs = stream.duration_ms() as f64 / 1000.0;
    tracing::info!("Decoded {} of audio", utils::format_duration(duration_secs));

    let spans = audio::plan_chunks(
        &stream,
        config.chunking.target_chunk_ms,
        &config.chunking.silence_params(),
    );
    tracing::info!("Planned {} chunks", spans.len());

    let limiter = Arc::new(Semaphore::new(config.app.max_concurrent_requests));

    let speech = Arc::new(SpeechClient::new(
        config.speech.endpoint.clone(),
        speech_key,
        config.speech.language.clone(),
    ));
    let transcription = TranscriptionPipeline::new(
        speech,
        cache,
        config.speech.retry(),
        limiter.clone(),
        cli.quiet,
    );
    let transcripts = transcription.run(&stream, &spans).await?;

    let combined = output::combine_transcripts(&transcripts);
    let raw_path = output::transcript_path(&root, &video_id);
    output::write_text(&raw_path, &combined)?;
    tracing::info!("Raw transcript saved to {}", raw_path.display());

    let prompts = PromptSet::load(
        config.correction.correction_prompt_file.as_deref(),
        config.correction.summary_prompt_file.as_deref(),
    )?;
    let completion = Arc::new(CompletionClient::new(
        config.correction.endpoint.clone(),
        correction_key,
        config.correction.max_tokens,
    ));
    let correction = CorrectionPipeline::new(
        completion,
        prompts,
        config.correction.chunk_char_budget,
        limiter,
        cli.quiet,
    );
    let document = correction.run(&combined).await?;

    let corrected_path = output::corrected_transcript_path(&root, &video_id);
    output::save_final_document(&corrected_path, &document)?;

    let metadata = RunMetadata {
        video_id: video_id.clone(),
        title: probe_title,
        audio_duration_secs: duration_secs,
        chunk_count: spans.len(),
        correction_chunk_count: document.transcripts.len(),
        completed_at: chrono::Utc::now(),
    };
    output::save_run_metadata(&output::run_metadata_path(&root, &video_id), &metadata)
        .context("failed to save run metadata")?;

    println!("Corrected transcript saved to: {}", corrected_path.display());

    Ok(())
}
