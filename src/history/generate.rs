//! Injected text-generation capability for summarization

use crate::error::ContextError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Text-generation contract consumed by the summarizer.
///
/// May fail or time out; the summarizer treats both identically and degrades
/// to its deterministic fallback summary.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Text generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Empty response")]
    EmptyResponse,
}

// Boundary conversion for callers that drive a TextGenerator directly; inside
// the refresh path generation failures degrade to the fallback summary instead.
impl From<GenerationError> for ContextError {
    fn from(err: GenerationError) -> Self {
        ContextError::Generation(err.to_string())
    }
}

/// Configuration for the HTTP generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Text generator backed by an OpenAI-compatible chat completions API
pub struct HttpGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::InitializationError(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a helpful assistant that creates concise conversation summaries.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: Some(512),
            temperature: Some(0.3),
        };

        let mut last_error = None;
        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} for generation", attempt);
                tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
            }

            let mut req = self.client.post(&self.config.endpoint).json(&request);
            if let Some(ref api_key) = self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            match req.send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        last_error =
                            Some(GenerationError::ApiError(format!("HTTP {}: {}", status, body)));
                        continue;
                    }

                    match response.json::<ChatCompletionResponse>().await {
                        Ok(resp) => {
                            if let Some(choice) = resp.choices.first() {
                                let text = choice.message.content.trim().to_string();
                                if text.is_empty() {
                                    last_error = Some(GenerationError::EmptyResponse);
                                    continue;
                                }
                                debug!("Generation successful on attempt {}", attempt);
                                return Ok(text);
                            }
                            last_error = Some(GenerationError::ApiError(
                                "No choices in response".to_string(),
                            ));
                        }
                        Err(e) => {
                            last_error = Some(GenerationError::ApiError(format!(
                                "Failed to parse response: {}",
                                e
                            )));
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(GenerationError::NetworkError(e.to_string()));
                }
            }
        }

        warn!(
            "Generation failed after {} attempts",
            self.config.max_retries
        );
        Err(last_error.unwrap_or(GenerationError::EmptyResponse))
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
