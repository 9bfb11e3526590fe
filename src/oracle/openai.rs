//! OpenAI chat-completions oracle

use super::history::{DialogueHistory, Message};
use super::{Oracle, OracleError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 350;
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub endpoint: String,
}

impl OracleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`
    pub fn from_env() -> Result<Self, OracleError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(OracleError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Ok(endpoint) = std::env::var("OPENAI_BASE_URL") {
            config.endpoint = endpoint;
        }
        Ok(config)
    }
}

pub struct OpenAiOracle {
    client: Client,
    config: OracleConfig,
}

impl OpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_key.trim().is_empty() {
            return Err(OracleError::MissingApiKey);
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn request_body(&self, history: &DialogueHistory, prompt: &Message) -> Value {
        let mut messages = history.text_only();
        messages.push(prompt.clone());

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
        })
    }
}

/// Pull the assistant text out of a chat-completions response
fn extract_content(body: &Value) -> Result<String, OracleError> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| OracleError::EmptyResponse(format!("no choices in {}", body)))?;

    if let Some(reason) = choice["finish_reason"].as_str() {
        if reason != "stop" {
            return Err(OracleError::Incomplete(reason.to_string()));
        }
    }

    choice["message"]["content"]
        .as_str()
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| OracleError::EmptyResponse(body.to_string()))
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&mut self, history: &DialogueHistory, prompt: &Message) -> Result<String, OracleError> {
        log::debug!(
            "Sending {} history messages plus new prompt to {}",
            history.len(),
            self.config.model
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(history, prompt))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let content = extract_content(&body)?;
        log::debug!("Oracle says: {}", content);
        Ok(content)
    }
}
