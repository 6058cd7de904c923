//! OpenAI Client
//!
//! LLM client implementation for the OpenAI chat completions API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::llm_client::LlmClient;
use crate::config::ModelConfig;

/// Default OpenAI model
pub const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the default model at temperature 0
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL, 0.0)
    }

    /// Create with a specific model and sampling temperature
    pub fn with_model(api_key: String, model: &str, temperature: f32) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
            temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from one of the per-agent model settings
    pub fn from_model_config(api_key: String, config: &ModelConfig) -> Self {
        Self::with_model(api_key, &config.model, config.temperature)
    }

    /// Point at an OpenAI-compatible endpoint (proxy, gateway)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Chat-completions request in JSON-object mode
    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        })
    }

    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = self.request_body(system_prompt, user_prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI returned no choices"))?;

        tracing::debug!(
            model = %self.model,
            chars = content.len(),
            "OpenAI response received"
        );
        Ok(content)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.call_api(system_prompt, user_prompt).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}
