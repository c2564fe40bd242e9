//! Anthropic-style messages endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::CoverdiffError;
use crate::secrets;

use super::{prompt, ModelClient, ModelError, ModelResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

impl AnthropicClient {
    /// Builds a client from config, resolving the API key through the
    /// usual secret-source priority.
    pub fn from_config(config: &ModelConfig) -> Result<Self, CoverdiffError> {
        let api_key = secrets::resolve_secret(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )?;

        // The deadline rides on each request, not the client, so a future
        // per-call override does not need a new connection pool.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CoverdiffError::Validation(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn classify_transport(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.timeout)
        } else {
            ModelError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn compare(
        &self,
        baseline_text: &str,
        renewal_text: &str,
    ) -> Result<ModelResponse, ModelError> {
        let user_prompt = prompt::build_prompt(baseline_text, renewal_text);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: &user_prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 429 and 5xx (incl. 529 overloaded) are transient; other 4xx
            // mean the request itself was rejected.
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ModelError::Unavailable(format!("HTTP {}", status)));
            }
            let detail = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ModelError::Refused(detail));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(ModelError::Refused(
                "response contained no text content".to_string(),
            ));
        }

        debug!(
            model = %parsed.model,
            response_chars = text.len(),
            "model comparison call completed"
        );

        Ok(ModelResponse {
            text,
            model_version: if parsed.model.is_empty() {
                self.model.clone()
            } else {
                parsed.model
            },
        })
    }
}
