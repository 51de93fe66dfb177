//! Provider router: selects the model client based on `[model]` config.

use std::sync::Arc;

use toolloop_config::{KNOWN_PROVIDERS, ModelConfig};
use toolloop_core::error::TransportError;
use toolloop_core::model::ModelClient;
use tracing::debug;

use crate::gemini::GeminiClient;
use crate::openai_compat::OpenAiCompatClient;

/// Build the configured model client.
///
/// `provider` is `"gemini"`, a well-known OpenAI-compatible backend name, or
/// `"custom:<base url>"` for any other OpenAI-compatible endpoint. A name
/// with no known endpoint and no `api_url` is `NotConfigured`.
pub fn build_from_config(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, TransportError> {
    debug!(provider = %config.provider, model = %config.model, "Building model client");

    if config.provider == "gemini" {
        let mut client = GeminiClient::new(config.api_key.clone(), &config.model)
            .with_temperature(config.temperature)
            .with_max_output_tokens(config.max_output_tokens);
        if let Some(url) = &config.api_url {
            client = client.with_base_url(url);
        }
        return Ok(Arc::new(client));
    }

    let (name, base_url) = match config.provider.strip_prefix("custom:") {
        Some(url) => ("custom".to_string(), url.to_string()),
        None => {
            let base_url = config
                .api_url
                .clone()
                .or_else(|| default_base_url(&config.provider))
                .ok_or_else(|| {
                    TransportError::NotConfigured(format!(
                        "unknown provider '{}' (known: {}); set model.api_url or use \"custom:<base url>\"",
                        config.provider,
                        KNOWN_PROVIDERS.join(", ")
                    ))
                })?;
            (config.provider.clone(), base_url)
        }
    };

    Ok(Arc::new(
        OpenAiCompatClient::new(name, base_url, config.api_key.clone(), &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_output_tokens),
    ))
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
