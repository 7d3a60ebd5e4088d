use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cleanscribe",
    about = "Turn a video URL into a polished transcript with notes and a summary",
    version,
    long_about = "Downloads the audio track of a video, splits it into chunks at natural \
pauses, transcribes each chunk through a remote speech service, and passes the combined \
transcript through a text-completion service for punctuation and grammar correction, \
note extraction, and a closing summary."
)]
pub struct Cli {
    /// Video URL to transcribe
    ///
    /// Optional at the clap level so its absence can be reported as a usage
    /// failure with exit code 1 rather than clap's exit code 2.
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Config file path (defaults to cleanscribe.yaml, then the user config dir)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for downloads, caches, and transcripts
    #[arg(short, long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Language code sent with every recognition request
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<String>,

    /// Target audio chunk length in seconds
    #[arg(long, value_name = "SECS")]
    pub target_chunk_secs: Option<u64>,

    /// Upper bound on concurrent remote service calls
    #[arg(long, value_name = "COUNT")]
    pub max_concurrency: Option<usize>,

    /// Disable progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}
