//! `toolloop doctor`: diagnose configuration and API keys.

use std::path::Path;
use std::time::Duration;

use toolloop_config::AppConfig;
use toolloop_core::model::ModelClient;

/// Upper bound on the backend reachability check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Pass(String),
    Warn(String),
    Fail(String),
}

impl Check {
    fn is_issue(&self) -> bool {
        !matches!(self, Self::Pass(_))
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass(msg) => write!(f, "  ✅ {msg}"),
            Self::Warn(msg) => write!(f, "  ⚠️  {msg}"),
            Self::Fail(msg) => write!(f, "  ❌ {msg}"),
        }
    }
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 toolloop doctor");
    println!("==================\n");

    let path = super::config_path(config_path);
    let mut checks = Vec::new();

    if path.exists() {
        checks.push(Check::Pass(format!("Config file found: {}", path.display())));
    } else {
        checks.push(Check::Warn(format!(
            "No config file at {}; using defaults (run `toolloop onboard`)",
            path.display()
        )));
    }

    match AppConfig::load_with_env(&path) {
        Ok(config) => {
            checks.push(Check::Pass("Config valid".into()));
            checks.extend(diagnose(&config));
            if !config.model.needs_api_key() || config.has_api_key() {
                match toolloop_providers::build_from_config(&config.model) {
                    Ok(client) => checks.push(check_backend(client.as_ref(), HEALTH_TIMEOUT).await),
                    Err(e) => checks.push(Check::Fail(format!("Model client: {e}"))),
                }
            }
        }
        Err(e) => checks.push(Check::Fail(format!("Config invalid: {e}"))),
    }

    for check in &checks {
        println!("{check}");
    }

    let issues = checks.iter().filter(|c| c.is_issue()).count();
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Checks that only need a loaded config.
pub fn diagnose(config: &AppConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    let provider = &config.model.provider;
    if config.has_api_key() {
        checks.push(Check::Pass(format!("Model API key configured ({provider})")));
    } else if !config.model.needs_api_key() {
        checks.push(Check::Pass(format!("Provider {provider} runs without a key")));
    } else {
        checks.push(Check::Fail(format!(
            "No model API key for {provider}; set GOOGLE_API_KEY or [model] api_key"
        )));
    }

    match toolloop_tools::default_registry(&config.tools) {
        Ok(registry) => checks.push(Check::Pass(format!(
            "{} tool(s) enabled: {}",
            registry.len(),
            registry.names().join(", ")
        ))),
        Err(e) => checks.push(Check::Fail(format!("Tool setup failed: {e}"))),
    }

    let enabled = |name: &str| config.tools.enabled.iter().any(|t| t == name);
    if enabled("get_weather") && config.tools.weather.api_key.is_none() {
        checks.push(Check::Warn(
            "get_weather has no API key; set OPENWEATHER_API_KEY".into(),
        ));
    }
    if enabled("fetch_stock_price") && config.tools.stock.api_key.is_none() {
        checks.push(Check::Warn(
            "fetch_stock_price has no API key; set ALPHAVANTAGE_API_KEY".into(),
        ));
    }

    checks
}

/// Ask the model backend whether it is reachable.
pub async fn check_backend(client: &dyn ModelClient, timeout: Duration) -> Check {
    let name = client.name();
    match tokio::time::timeout(timeout, client.health_check()).await {
        Ok(Ok(true)) => Check::Pass(format!("Model backend {name} reachable")),
        Ok(Ok(false)) => Check::Fail(format!("Model backend {name} rejected the health check")),
        Ok(Err(e)) => Check::Fail(format!("Model backend {name} unreachable: {e}")),
        Err(_) => Check::Warn(format!(
            "Model backend {name} did not answer within {}s",
            timeout.as_secs()
        )),
    }
}
