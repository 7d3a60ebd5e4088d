//! Client for the text completion service used for transcript correction.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Completion boundary: prompt in, model text out. Implementations are
/// expected to be deterministic-ish (temperature 0) since corrections of the
/// same chunk should not drift between runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, prompt: String) -> Result<String>;
}

/// Request body for the completions endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
    n: u32,
    stop: Option<&'a str>,
    temperature: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

impl<'a> CompletionRequest<'a> {
    fn new(prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            prompt,
            max_tokens,
            n: 1,
            stop: None,
            temperature: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

fn completion_text(response: CompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .context("correction service returned no choices")?;
    Ok(choice.text.trim().to_string())
}

/// HTTP client for an OpenAI-style completions endpoint.
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(endpoint: String, api_key: String, max_tokens: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            max_tokens,
        }
    }
}

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn complete(&self, prompt: String) -> Result<String> {
        let request = CompletionRequest::new(&prompt, self.max_tokens);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("failed to reach the correction service")?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            bail!("correction service returned HTTP {}: {}", status, message);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("failed to parse the correction service response")?;

        completion_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_fixed_sampling_parameters() {
        let request = CompletionRequest::new("fix this", 1648);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "prompt": "fix this",
                "max_tokens": 1648,
                "n": 1,
                "stop": null,
                "temperature": 0.0,
                "frequency_penalty": 0.0,
                "presence_penalty": 0.0,
            })
        );
    }

    #[test]
    fn response_text_is_trimmed() {
        let parsed: CompletionResponse = serde_json::from_value(json!({
            "id": "cmpl-1",
            "object": "text_completion",
            "choices": [{"text": "\n\nCorrected text.\nNOTES:\n- a note\n", "index": 0}],
        }))
        .unwrap();

        assert_eq!(
            completion_text(parsed).unwrap(),
            "Corrected text.\nNOTES:\n- a note"
        );
    }

    #[test]
    fn empty_choice_list_is_an_error() {
        let parsed: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = completion_text(parsed).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
