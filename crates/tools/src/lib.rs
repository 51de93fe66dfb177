//! Built-in tool implementations for toolloop.
//!
//! Tools give the agent the ability to interact with the world:
//! do math, check the weather, look up stock prices, and inspect
//! local disk usage.

pub mod calculator;
pub mod disk_usage;
pub mod stock_price;
pub mod weather_lookup;

use std::time::Duration;

use toolloop_config::ToolsConfig;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Tool, ToolRegistry};
use tracing::debug;

/// Names of every built-in tool, in default registration order.
pub const BUILTIN_TOOLS: &[&str] = &[
    "calculator",
    "get_weather",
    "get_disk_usage",
    "fetch_stock_price",
];

/// Create the tool registry described by `config.enabled`.
///
/// Tools are registered in the order they are listed. Unknown names fail
/// with `ToolError::UnknownTool`, repeated names with `DuplicateTool`.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    for name in &config.enabled {
        registry.register(build_tool(name, config)?)?;
    }
    debug!(tools = ?registry.names(), "Tool registry ready");
    Ok(registry)
}

/// Construct a single built-in tool by name.
pub fn build_tool(name: &str, config: &ToolsConfig) -> Result<Box<dyn Tool>, ToolError> {
    let tool: Box<dyn Tool> = match name {
        "calculator" => Box::new(calculator::CalculatorTool),
        "get_weather" => Box::new(weather_lookup::WeatherLookupTool::new(
            config.weather.clone(),
            http_client(config.http_timeout_secs),
        )),
        "fetch_stock_price" => Box::new(stock_price::StockPriceTool::new(
            config.stock.clone(),
            http_client(config.http_timeout_secs),
        )),
        "get_disk_usage" => Box::new(disk_usage::DiskUsageTool::new(config.disk.clone())),
        other => return Err(ToolError::UnknownTool(other.to_string())),
    };
    Ok(tool)
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Turn a non-success upstream reply into a tool failure.
pub(crate) fn upstream_error(tool_name: &str, status: u16, body: &str) -> ToolError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: format!("upstream returned {status}: {detail}"),
    }
}
