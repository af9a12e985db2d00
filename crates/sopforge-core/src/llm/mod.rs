//! LLM client for AI-powered analysis.
//!
//! Talks to any OpenAI-compatible chat-completions API (local ChatGLM
//! deployments, cloud endpoints, the official OpenAI API) over HTTP.
//! Configuration comes from the environment so deployments can point the
//! backend at whatever endpoint they run.

use serde::{Deserialize, Serialize};

/// Configuration for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base URL, e.g. `http://localhost:8080/v1`
    pub base_url: String,
    /// API key / bearer token (some local deployments accept any value)
    pub api_key: String,
    /// Model ID
    pub model: String,
    /// Whether the analysis endpoint is enabled at all
    pub enabled: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: String::new(),
            model: "glm-4".to_string(),
            enabled: false,
        }
    }
}

impl LlmConfig {
    /// Read configuration from `LLM_API_BASE`, `LLM_API_KEY`, `LLM_MODEL`
    /// and `LLM_ENABLED` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("LLM_API_BASE").unwrap_or(defaults.base_url),
            api_key: std::env::var("LLM_API_KEY").unwrap_or(defaults.api_key),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            enabled: std::env::var("LLM_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.enabled),
        }
    }
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM service is disabled")]
    Disabled,
    #[error("Failed to connect to LLM API: {0}")]
    Connection(String),
    #[error("LLM request failed: {0}")]
    Response(String),
}

/// Client for an OpenAI-compatible chat-completions API.
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        tracing::info!(
            "LLM client initialized: model={}, base_url={}, enabled={}",
            config.model,
            config.base_url,
            config.enabled
        );
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send chat messages and return the assistant's text response.
    ///
    /// POST {base_url}/chat/completions with a bearer token, standard
    /// OpenAI-compatible body.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        for (i, msg) in messages.iter().enumerate() {
            tracing::debug!(
                "LLM request message[{}] ({}): {}",
                i,
                msg.role,
                truncate_for_log(&msg.content)
            );
        }
        tracing::info!(
            "Calling LLM API: {} (model: {}, messages: {})",
            url,
            self.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LlmError::Connection(e.to_string())
                } else {
                    LlmError::Response(e.to_string())
                }
            })?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Response(format!("invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Response(format!(
                "HTTP {}: {}",
                status,
                truncate_for_log(&payload.to_string())
            )));
        }

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Response("empty content in LLM response".to_string()))?
            .to_string();

        if let Some(usage) = payload.get("usage") {
            tracing::info!(
                "LLM response: {} chars (tokens: prompt={}, completion={})",
                content.chars().count(),
                usage["prompt_tokens"].as_u64().unwrap_or(0),
                usage["completion_tokens"].as_u64().unwrap_or(0)
            );
        }
        tracing::debug!("LLM response content: {}", truncate_for_log(&content));

        Ok(content)
    }

    /// Analyze text content: a system instruction plus the user content.
    pub async fn analyze_text(&self, prompt: &str, content: &str) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(prompt), ChatMessage::user(content)];
        self.chat(&messages, 0.7, 20_000).await
    }
}

fn truncate_for_log(content: &str) -> String {
    if content.chars().count() > 500 {
        let head: String = content.chars().take(500).collect();
        format!("{}... (truncated)", head)
    } else {
        content.to_string()
    }
}
