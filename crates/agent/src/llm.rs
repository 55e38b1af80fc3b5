use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ziwu_core::config::LlmConfig;
use ziwu_core::ModelError;

/// Single-shot chat completion: one system prompt, one user prompt, raw text back.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (LiteLLM,
/// OpenAI, vLLM and the like). Always asks for a JSON object response.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ModelError::Auth("api key is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ModelError::Unavailable(format!("http client init failed: {error}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, &detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                ModelError::Timeout(self.timeout_secs)
            } else {
                ModelError::MalformedResponse(format!("completion body did not decode: {error}"))
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ModelError::MalformedResponse("completion contained no message content".to_string())
            })?;

        debug!(
            event_name = "diagnosis.model.completed",
            model = %self.model,
            response_chars = content.chars().count(),
            "model completion received"
        );
        Ok(content)
    }
}

impl OpenAiCompatibleClient {
    fn transport_error(&self, error: reqwest::Error) -> ModelError {
        if error.is_timeout() {
            ModelError::Timeout(self.timeout_secs)
        } else if error.is_connect() {
            ModelError::Unavailable(format!("could not connect to {}", self.endpoint))
        } else {
            ModelError::Unavailable(error.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelError {
    let detail = format!("{status}: {}", error_detail(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(detail),
        _ => ModelError::Unavailable(detail),
    }
}

/// `error.message` from an OpenAI-style error body, else the body itself.
fn error_detail(body: &str) -> String {
    const MAX_DETAIL_CHARS: usize = 300;

    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        return "no error detail".to_string();
    }
    message.chars().take(MAX_DETAIL_CHARS).collect()
}
