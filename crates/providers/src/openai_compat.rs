//! OpenAI-compatible model client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, Together AI, Groq and any
//! endpoint exposing `/chat/completions`. The rendered prompt is sent as a
//! single user message.

use async_trait::async_trait;
use serde::Deserialize;
use toolloop_core::error::TransportError;
use toolloop_core::model::ModelClient;
use tracing::{debug, warn};

use crate::{OBSERVATION_STOP, request_error, status_error};

/// An OpenAI-compatible chat completion client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 1024,
            client: reqwest::Client::new(),
        }
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama client. Ollama does not need a key.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            None,
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stop": [OBSERVATION_STOP],
            "stream": false,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let mut request = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(request_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(status_error(status, error_body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(request_error)?;
        Ok(response.status().is_success())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
