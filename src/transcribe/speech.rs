//! Client for the remote speech recognition service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Failures surfaced by a speech recognition call.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Transient outage (HTTP 503); the caller may retry.
    #[error("speech service unavailable: {0}")]
    Unavailable(String),

    #[error("speech request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("speech service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

/// Remote recognition boundary: mono 16 kHz 16-bit WAV bytes in, transcript
/// out. `Ok(None)` means the service found nothing to transcribe, which is a
/// valid result and not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn recognize(&self, audio: Vec<u8>) -> Result<Option<String>, SpeechError>;
}

/// Retry policy for transient speech-service outages.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(5),
            jitter: Duration::from_secs(1),
        }
    }
}

/// HTTP client posting raw WAV bodies to a recognition endpoint.
pub struct SpeechClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl SpeechClient {
    pub fn new(endpoint: String, api_key: String, language: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            language,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

/// Joins every alternative of every result into one transcript. An empty
/// result set maps to `None`.
fn transcript_from_response(response: RecognizeResponse) -> Option<String> {
    let mut parts = Vec::new();
    for result in response.results {
        for alternative in result.alternatives {
            let text = alternative.transcript.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[async_trait]
impl SpeechApi for SpeechClient {
    async fn recognize(&self, audio: Vec<u8>) -> Result<Option<String>, SpeechError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("language", self.language.as_str())])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.api_key))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Unavailable(message));
        }

        if status == reqwest::StatusCode::BAD_REQUEST {
            let message = response.text().await.unwrap_or_default();
            // The service rejects zero-length audio with a 400; that is a
            // valid "nothing to transcribe" outcome, not a failure.
            if message.to_lowercase().contains("empty audio") {
                return Ok(None);
            }
            return Err(SpeechError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RecognizeResponse = response.json().await?;
        Ok(transcript_from_response(parsed))
    }
}

/// Calls the service up to `retry.max_attempts` times, sleeping a jittered
/// interval between attempts while the outage is transient. Exhausting the
/// budget degrades to `Ok(None)` so one unreachable chunk does not sink the
/// batch; any failure other than `Unavailable` propagates immediately.
pub async fn recognize_with_retry(
    api: &dyn SpeechApi,
    label: &str,
    audio: &[u8],
    retry: &RetryConfig,
) -> Result<Option<String>> {
    for attempt in 1..=retry.max_attempts {
        match api.recognize(audio.to_vec()).await {
            Ok(transcript) => return Ok(transcript),
            Err(SpeechError::Unavailable(detail)) => {
                if attempt == retry.max_attempts {
                    tracing::warn!(
                        "giving up on {} after {} attempts: {}",
                        label,
                        attempt,
                        detail
                    );
                    return Ok(None);
                }
                let delay = jittered(retry.interval, retry.jitter);
                tracing::warn!(
                    "speech service unavailable ({}), retrying {} in {:.1}s",
                    detail,
                    label,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Err(err).context(format!("transcription failed for {label}"));
            }
        }
    }

    Ok(None)
}

/// `interval` shifted by a pseudo-random offset in `[-jitter, +jitter]`,
/// derived from the clock's subsecond nanos, so simultaneous retries do not
/// all hit the service at the same instant.
fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let amplitude_ms = jitter.as_millis() as i64;
    if amplitude_ms == 0 {
        return interval;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::from(elapsed.subsec_nanos()))
        .unwrap_or(0);
    let offset_ms = nanos % (2 * amplitude_ms + 1) - amplitude_ms;

    if offset_ms >= 0 {
        interval + Duration::from_millis(offset_ms as u64)
    } else {
        interval.saturating_sub(Duration::from_millis(offset_ms.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(transcripts: &[&[&str]]) -> RecognizeResponse {
        RecognizeResponse {
            results: transcripts
                .iter()
                .map(|alternatives| RecognitionResult {
                    alternatives: alternatives
                        .iter()
                        .map(|t| RecognitionAlternative {
                            transcript: t.to_string(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn joins_alternatives_across_results() {
        let parsed = response(&[&["hello there"], &["general", "kenobi"]]);
        assert_eq!(
            transcript_from_response(parsed),
            Some("hello there general kenobi".to_string())
        );
    }

    #[test]
    fn empty_results_map_to_none() {
        assert_eq!(transcript_from_response(response(&[])), None);
        assert_eq!(transcript_from_response(response(&[&[""]])), None);
    }

    #[test]
    fn response_parses_without_optional_fields() {
        let parsed: RecognizeResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(transcript_from_response(parsed), None);

        let parsed: RecognizeResponse = serde_json::from_str(
            r#"{"results": [{"alternatives": [{"transcript": "ok"}]}, {}]}"#,
        )
        .unwrap();
        assert_eq!(transcript_from_response(parsed), Some("ok".to_string()));
    }

    #[test]
    fn jitter_stays_within_amplitude() {
        let interval = Duration::from_secs(5);
        let jitter = Duration::from_secs(1);
        for _ in 0..200 {
            let delay = jittered(interval, jitter);
            assert!(delay >= Duration::from_secs(4), "delay {delay:?} below floor");
            assert!(delay <= Duration::from_secs(6), "delay {delay:?} above ceiling");
        }
    }

    #[test]
    fn zero_jitter_returns_interval() {
        assert_eq!(
            jittered(Duration::from_secs(5), Duration::ZERO),
            Duration::from_secs(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_outage_is_attempted_exactly_max_retries_times() {
        let mut api = MockSpeechApi::new();
        api.expect_recognize()
            .times(3)
            .returning(|_| Err(SpeechError::Unavailable("503".to_string())));

        let result = recognize_with_retry(&api, "chunk 1", b"RIFF", &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_an_attempt_succeeds() {
        let mut api = MockSpeechApi::new();
        let mut calls = 0u32;
        api.expect_recognize().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(SpeechError::Unavailable("503".to_string()))
            } else {
                Ok(Some("recovered".to_string()))
            }
        });

        let result = recognize_with_retry(&api, "chunk 1", b"RIFF", &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(result, Some("recovered".to_string()));
    }

    #[tokio::test]
    async fn non_transient_failures_propagate_without_retry() {
        let mut api = MockSpeechApi::new();
        api.expect_recognize().times(1).returning(|_| {
            Err(SpeechError::Status {
                status: 500,
                message: "boom".to_string(),
            })
        });

        let err = recognize_with_retry(&api, "chunk 1", b"RIFF", &RetryConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chunk 1"));
    }

    #[tokio::test]
    async fn empty_audio_result_passes_through() {
        let mut api = MockSpeechApi::new();
        api.expect_recognize().times(1).returning(|_| Ok(None));

        let result = recognize_with_retry(&api, "chunk 1", b"RIFF", &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
