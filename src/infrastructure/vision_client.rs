//! Image classification through an OpenAI-compatible chat completions API
//!
//! The model sees the product image and the category vocabulary and answers
//! with free text; deciding what that text means is left to the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::services::ImageClassifier;
use crate::infrastructure::config::ClassifierConfig;
use crate::infrastructure::retry_policy::RetryPolicy;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageRef<'a> },
}

#[derive(Debug, Serialize)]
struct ImageRef<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Prompt with the `{categories}` placeholder filled in
pub fn render_prompt(template: &str, vocabulary: &[&str]) -> String {
    template.replace("{categories}", &vocabulary.join(", "))
}

pub struct OpenAiVisionClient {
    client: Client,
    config: ClassifierConfig,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiVisionClient {
    /// Reads the API key from the environment variable named in the config
    pub fn new(config: ClassifierConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
        Self::with_api_key(config, api_key, retry)
    }

    pub fn with_api_key(config: ClassifierConfig, api_key: Option<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create classifier HTTP client")?;

        Ok(Self {
            client,
            config,
            api_key,
            retry,
        })
    }

    async fn complete_once(&self, api_key: &str, request: &ChatRequest<'_>) -> CatalogResult<String> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CatalogError::Classifier { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| CatalogError::ClassifierRejected {
            reason: format!("unreadable response: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CatalogError::ClassifierRejected {
                reason: "response has no message content".to_string(),
            })
    }
}

/// Rate limits and server errors are worth retrying; other statuses are not
fn status_error(status: StatusCode, body: &str) -> CatalogError {
    let reason = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CatalogError::Classifier { reason }
    } else {
        CatalogError::ClassifierRejected { reason }
    }
}

#[async_trait]
impl ImageClassifier for OpenAiVisionClient {
    async fn classify_image(&self, image_url: &str, vocabulary: &[&str]) -> CatalogResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| CatalogError::ClassifierRejected {
            reason: format!("{} is not set", self.config.api_key_env),
        })?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: render_prompt(&self.config.prompt, vocabulary),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageRef { url: image_url },
                    },
                ],
            }],
        };

        let answer = self
            .retry
            .run("image classification", |_| self.complete_once(api_key, &request))
            .await?;
        debug!("Classifier answered '{}' for {}", answer.trim(), image_url);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_lists_vocabulary() {
        let prompt = render_prompt(
            &ClassifierConfig::default().prompt,
            &["low", "mid", "high", "basketball", "slides"],
        );
        assert!(prompt.contains("one of the following: low, mid, high, basketball, slides."));
        assert!(!prompt.contains("{categories}"));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "categorize".into() },
                    ContentPart::ImageUrl {
                        image_url: ImageRef { url: "https://static.nike.com/a.png" },
                    },
                ],
            }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o",
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "categorize" },
                        { "type": "image_url", "image_url": { "url": "https://static.nike.com/a.png" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": " Mid\n" } }]
        }))
        .unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some(" Mid\n"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_rejected_without_retry() {
        let client =
            OpenAiVisionClient::with_api_key(ClassifierConfig::default(), None, RetryPolicy::none()).unwrap();
        let error = client
            .classify_image("https://static.nike.com/a.png", &["low"])
            .await
            .unwrap_err();
        assert!(matches!(error, CatalogError::ClassifierRejected { .. }));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_status_error_retries_only_transient_statuses() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE] {
            assert!(status_error(status, "busy").is_retryable(), "{status} should be retried");
        }
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let error = status_error(status, "{\"error\":\"invalid_api_key\"}");
            assert!(matches!(error, CatalogError::ClassifierRejected { .. }));
            assert!(!error.is_retryable(), "{status} should not be retried");
        }
    }

    #[test]
    fn test_status_error_truncates_body() {
        let error = status_error(StatusCode::BAD_REQUEST, &"x".repeat(1000));
        assert!(error.to_string().len() < 300);
    }
}
