use crate::config::ServiceConfig;
use crate::domain::ports::LlmClient;
use crate::utils::error::{ExtractorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 這些狀態碼代表暫時性錯誤，固定間隔重試
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 529];

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl AnthropicClient {
    pub fn from_config(config: &ServiceConfig, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key: config.require_api_key()?.to_string(),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            retry_attempts: config.llm.retry_attempts.max(1),
            retry_delay: config.llm_retry_delay(),
        })
    }

    async fn send_once(&self, request: &MessagesRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(ExtractorError::LlmError {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "Anthropic usage: {} input / {} output tokens",
                usage.input_tokens,
                usage.output_tokens
            );
        }
        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Model output hit max_tokens ({}); it may be truncated", self.max_tokens);
        }

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ExtractorError::LlmError {
                status: None,
                message: "response contained no text".to_string(),
            });
        }
        Ok(text)
    }
}

fn is_retryable(error: &ExtractorError) -> bool {
    match error {
        ExtractorError::LlmError {
            status: Some(status),
            ..
        } => RETRYABLE_STATUS.contains(status),
        ExtractorError::HttpError(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let mut attempt = 1;
        loop {
            match self.send_once(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    tracing::warn!(
                        "Anthropic attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.retry_attempts,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
