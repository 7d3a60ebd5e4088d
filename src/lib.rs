//! Cleanscribe - turns a video URL into a polished, annotated transcript
//!
//! This library downloads a video's audio track, plans chunk boundaries at
//! natural silences, transcribes every chunk through a remote speech service
//! with caching and bounded retry, and pushes the combined transcript through
//! a text-completion service for correction, note extraction, and a summary.

pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod correct;
pub mod fetch;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use audio::{AudioStream, ChunkSpan, SilenceParams};
pub use cli::Cli;
pub use config::Config;
pub use correct::{CorrectionPipeline, FinalDocument};
pub use transcribe::TranscriptionPipeline;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
