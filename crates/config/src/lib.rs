//! Configuration loading, validation, and management for toolloop.
//!
//! Loads configuration from `~/.toolloop/config.toml` with environment
//! variable overrides. Validates all settings at startup. API keys are only
//! ever read from this file or the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toolloop_core::AgentConfig;

/// The root configuration structure.
///
/// Maps directly to `~/.toolloop/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Language model backend
    #[serde(default)]
    pub model: ModelConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Backends `model.provider` may name directly. Any other endpoint is
/// reached through `"custom:<base url>"` or an explicit `api_url`.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "gemini",
    "openai",
    "openrouter",
    "ollama",
    "deepseek",
    "groq",
    "together",
    "fireworks",
    "vllm",
    "llamacpp",
];

/// Backends that usually run on the local machine without a key.
const LOCAL_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp"];

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend: one of [`KNOWN_PROVIDERS`], or "custom:<base url>"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash-exp".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_output_tokens() -> u32 {
    1024
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl ModelConfig {
    /// Whether the backend expects an API key.
    pub fn needs_api_key(&self) -> bool {
        !LOCAL_PROVIDERS.contains(&self.provider.as_str()) && !self.provider.starts_with("custom:")
    }

    fn validate_provider(&self) -> Result<(), ConfigError> {
        let provider = self.provider.as_str();
        let custom = provider
            .strip_prefix("custom:")
            .is_some_and(|url| !url.trim().is_empty());
        if KNOWN_PROVIDERS.contains(&provider) || custom || self.api_url.is_some() {
            return Ok(());
        }
        Err(ConfigError::ValidationError(format!(
            "unknown model.provider '{provider}'; expected one of {}, or \"custom:<base url>\"",
            KNOWN_PROVIDERS.join(", ")
        )))
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools to register, in prompt order
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// Timeout for outbound HTTP requests made by tools
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub stock: StockConfig,

    #[serde(default)]
    pub disk: DiskConfig,
}

fn default_enabled_tools() -> Vec<String> {
    vec![
        "calculator".into(),
        "get_weather".into(),
        "get_disk_usage".into(),
        "fetch_stock_price".into(),
    ]
}
fn default_http_timeout_secs() -> u64 {
    20
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            http_timeout_secs: default_http_timeout_secs(),
            weather: WeatherConfig::default(),
            stock: StockConfig::default(),
            disk: DiskConfig::default(),
        }
    }
}

/// OpenWeatherMap settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_url")]
    pub api_url: String,

    /// "metric", "imperial" or "standard"
    #[serde(default = "default_weather_units")]
    pub units: String,
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".into()
}
fn default_weather_units() -> String {
    "metric".into()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_weather_url(),
            units: default_weather_units(),
        }
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("units", &self.units)
            .finish()
    }
}

/// Alpha Vantage settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct StockConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_stock_url")]
    pub api_url: String,

    /// Intraday bar interval ("1min", "5min", ...)
    #[serde(default = "default_stock_interval")]
    pub interval: String,
}

fn default_stock_url() -> String {
    "https://www.alphavantage.co/query".into()
}
fn default_stock_interval() -> String {
    "1min".into()
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_stock_url(),
            interval: default_stock_interval(),
        }
    }
}

impl std::fmt::Debug for StockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("interval", &self.interval)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Path inspected when the model does not name one
    #[serde(default = "default_disk_path")]
    pub default_path: String,
}

fn default_disk_path() -> String {
    "/".into()
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            default_path: default_disk_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolloop/config.toml).
    ///
    /// Also checks environment variables; see [`apply_env`](Self::apply_env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Keys already present in the file win over the environment:
    /// - model key: `TOOLLOOP_API_KEY`, `GOOGLE_API_KEY`, `OPENAI_API_KEY`
    /// - `TOOLLOOP_PROVIDER`, `TOOLLOOP_MODEL` (always override)
    /// - `OPENWEATHER_API_KEY`, `ALPHAVANTAGE_API_KEY`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("TOOLLOOP_API_KEY")
                .or_else(|| lookup("GOOGLE_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("TOOLLOOP_PROVIDER") {
            self.model.provider = provider;
        }

        if let Some(model) = lookup("TOOLLOOP_MODEL") {
            self.model.model = model;
        }

        if self.tools.weather.api_key.is_none() {
            self.tools.weather.api_key = lookup("OPENWEATHER_API_KEY");
        }

        if self.tools.stock.api_key.is_none() {
            self.tools.stock.api_key = lookup("ALPHAVANTAGE_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.retry_count == 0 {
            return Err(ConfigError::ValidationError(
                "agent.retry_count must be at least 1".into(),
            ));
        }

        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than 0".into(),
            ));
        }

        self.model.validate_provider()?;

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.tools.enabled.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(ConfigError::ValidationError(format!(
                "tools.enabled lists '{dup}' more than once"
            )));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
