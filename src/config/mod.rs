use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::audio::SilenceParams;
use crate::cli::Cli;
use crate::transcribe::speech::RetryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Speech recognition service settings
    pub speech: SpeechConfig,

    /// Transcript correction service settings
    pub correction: CorrectionConfig,

    /// Silence-aware chunking settings
    pub chunking: ChunkingConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Recognition endpoint accepting raw WAV bodies
    pub endpoint: String,

    /// Language code sent with every request
    pub language: String,

    /// Environment variable checked first for the API key
    pub api_key_env: String,

    /// Fallback file holding the API key
    pub api_key_file: PathBuf,

    /// Attempts per chunk while the service reports an outage
    pub max_retries: u32,

    /// Base wait between retry attempts, in seconds
    pub retry_interval_secs: u64,

    /// Random spread applied to the retry wait, in seconds
    pub retry_jitter_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Completions endpoint used for correction and summarization
    pub endpoint: String,

    /// Environment variable checked first for the API key
    pub api_key_env: String,

    /// Fallback file holding the API key
    pub api_key_file: PathBuf,

    /// Token budget for each completion response
    pub max_tokens: u32,

    /// Character budget for each correction chunk
    pub chunk_char_budget: usize,

    /// Custom correction prompt template (built-in if unset)
    pub correction_prompt_file: Option<PathBuf>,

    /// Custom summary prompt template (built-in if unset)
    pub summary_prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk length in milliseconds
    pub target_chunk_ms: u64,

    /// Minimum run of quiet audio that counts as a pause, in milliseconds
    pub min_silence_ms: u64,

    /// Loudness below which audio counts as quiet, in dBFS
    pub silence_threshold_db: f64,

    /// How far back from the chunk end to look for a pause, in milliseconds
    pub scan_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory for downloads, caches, and transcripts (CWD if unset)
    pub working_dir: Option<PathBuf>,

    /// Upper bound on in-flight service requests
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig {
                endpoint: "".to_string(),
                language: "en-US".to_string(),
                api_key_env: "SPEECH_API_KEY".to_string(),
                api_key_file: PathBuf::from("speech_key.txt"),
                max_retries: 3,
                retry_interval_secs: 5,
                retry_jitter_secs: 1,
            },
            correction: CorrectionConfig {
                endpoint: "https://api.openai.com/v1/engines/text-davinci-003/completions"
                    .to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                api_key_file: PathBuf::from("openai_key.txt"),
                max_tokens: 1648,
                chunk_char_budget: 1500,
                correction_prompt_file: None,
                summary_prompt_file: None,
            },
            chunking: ChunkingConfig {
                target_chunk_ms: 60_000,
                min_silence_ms: 1_000,
                silence_threshold_db: -16.0,
                scan_window_ms: 5_000,
            },
            app: AppConfig {
                working_dir: None,
                max_concurrent_requests: 8,
            },
        }
    }
}

impl SpeechConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_key(&self.api_key_env, &self.api_key_file)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries,
            interval: Duration::from_secs(self.retry_interval_secs),
            jitter: Duration::from_secs(self.retry_jitter_secs),
        }
    }
}

impl CorrectionConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_key(&self.api_key_env, &self.api_key_file)
    }
}

impl ChunkingConfig {
    pub fn silence_params(&self) -> SilenceParams {
        SilenceParams {
            min_silence_ms: self.min_silence_ms,
            threshold_db: self.silence_threshold_db,
            scan_window_ms: self.scan_window_ms,
        }
    }
}

/// Look up an API key in the environment, then in a key file.
fn resolve_key(env_name: &str, file: &Path) -> Result<String> {
    if let Ok(value) = std::env::var(env_name) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            return Ok(value);
        }
    }

    if file.exists() {
        let value = fs_err::read_to_string(file)?.trim().to_string();
        if !value.is_empty() {
            return Ok(value);
        }
    }

    bail!(
        "no API key found: set {} or put the key in {}",
        env_name,
        file.display()
    );
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(path_override: Option<&Path>) -> Result<Self> {
        if let Some(path) = path_override {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save().await?;
            tracing::warn!(
                "Created default config at {}; set the speech endpoint before running",
                config_path.display()
            );
            Ok(config)
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("cleanscribe.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("cleanscribe").join("config.yaml"))
    }

    /// Apply command line overrides on top of the loaded file
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(language) = &cli.language {
            self.speech.language = language.clone();
        }
        if let Some(dir) = &cli.working_dir {
            self.app.working_dir = Some(dir.clone());
        }
        if let Some(secs) = cli.target_chunk_secs {
            self.chunking.target_chunk_ms = secs * 1_000;
        }
        if let Some(limit) = cli.max_concurrency {
            self.app.max_concurrent_requests = limit;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.speech.endpoint.is_empty() {
            bail!("speech endpoint must be configured");
        }
        Url::parse(&self.speech.endpoint).context("speech endpoint is not a valid URL")?;

        if self.speech.language.is_empty() {
            bail!("speech language must be configured");
        }
        if self.speech.max_retries == 0 {
            bail!("speech max_retries must be at least 1");
        }

        if self.correction.endpoint.is_empty() {
            bail!("correction endpoint must be configured");
        }
        Url::parse(&self.correction.endpoint)
            .context("correction endpoint is not a valid URL")?;

        if self.correction.max_tokens == 0 {
            bail!("correction max_tokens must be positive");
        }
        if self.correction.chunk_char_budget == 0 {
            bail!("correction chunk_char_budget must be positive");
        }

        if self.chunking.target_chunk_ms == 0 {
            bail!("chunking target_chunk_ms must be positive");
        }
        if self.chunking.min_silence_ms == 0 {
            bail!("chunking min_silence_ms must be positive");
        }
        if self.chunking.scan_window_ms == 0 {
            bail!("chunking scan_window_ms must be positive");
        }

        if self.app.max_concurrent_requests == 0 {
            bail!("app max_concurrent_requests must be at least 1");
        }

        Ok(())
    }

    /// Root directory for downloads, caches, and transcripts
    pub fn working_root(&self) -> PathBuf {
        self.app
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
