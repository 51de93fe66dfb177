//! Google Gemini client (`generateContent` REST endpoint).
//!
//! The prompt is sent as a single user turn; the first candidate's text
//! parts are concatenated into the completion.

use async_trait::async_trait;
use serde::Deserialize;
use toolloop_core::error::TransportError;
use toolloop_core::model::ModelClient;
use tracing::{debug, warn};

use crate::{OBSERVATION_STOP, request_error, status_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A Gemini model client.
pub struct GeminiClient {
    model: String,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            temperature: 0.0,
            max_output_tokens: 1024,
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
                "stopSequences": [OBSERVATION_STOP],
            },
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let Some(api_key) = &self.api_key else {
            return Err(TransportError::NotConfigured(
                "no Gemini API key (set GOOGLE_API_KEY or model.api_key)".into(),
            ));
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(status_error(status, error_body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        body.into_text()
    }

    /// Fetches the model's metadata, which also proves the key is accepted.
    async fn health_check(&self) -> Result<bool, TransportError> {
        let Some(api_key) = &self.api_key else {
            return Err(TransportError::NotConfigured("no Gemini API key".into()));
        };
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(request_error)?;
        Ok(response.status().is_success())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, TransportError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(TransportError::InvalidResponse(format!(
                "prompt blocked: {reason}"
            )));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::InvalidResponse("No candidates in response".into()))?;

        Ok(candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}
