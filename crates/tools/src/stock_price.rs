//! Stock price tool backed by the Alpha Vantage intraday time series.

use async_trait::async_trait;
use serde_json::Value;
use toolloop_config::StockConfig;
use toolloop_core::action::Arguments;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolOutput};
use tracing::debug;

use crate::upstream_error;

pub struct StockPriceTool {
    config: StockConfig,
    client: reqwest::Client,
}

impl StockPriceTool {
    pub fn new(config: StockConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "fetch_stock_price"
    }

    fn description(&self) -> &str {
        "Fetch the latest intraday stock price for a ticker symbol. Returns the symbol, opening price of the latest bar, and its timestamp."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![Parameter::required(
            "symbol",
            ParameterKind::String,
            "The stock ticker symbol, e.g. 'AAPL'",
        )])
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let symbol = arguments
            .get("symbol")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().into(),
                reason: "missing 'symbol' argument".into(),
            })?;

        let api_key = self.config.api_key.as_deref().ok_or_else(|| ToolError::NotConfigured {
            tool_name: self.name().into(),
            reason: "no Alpha Vantage API key (set ALPHAVANTAGE_API_KEY)".into(),
        })?;

        debug!(tool = self.name(), %symbol, "Fetching intraday series");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "fetch_stock_price".into(),
            reason,
        };

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol.as_str()),
                ("interval", self.config.interval.as_str()),
                ("apikey", api_key),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(upstream_error(self.name(), status.as_u16(), &body));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| failed(format!("unexpected stock response: {e}")))?;
        let quote = latest_quote(&data, &symbol, &self.config.interval).map_err(failed)?;
        Ok(ToolOutput::Structured(quote))
    }
}

/// Pick the most recent bar of an intraday series.
///
/// This is the newest timestamp, not the first key in sorted order (which
/// would be the oldest bar). Alpha Vantage timestamps (`YYYY-MM-DD HH:MM:SS`)
/// sort lexicographically.
fn latest_quote(data: &Value, symbol: &str, interval: &str) -> Result<Value, String> {
    let series_key = format!("Time Series ({interval})");
    let Some(series) = data.get(&series_key).and_then(Value::as_object) else {
        let detail = ["Error Message", "Note", "Information"]
            .iter()
            .find_map(|k| data.get(*k).and_then(Value::as_str))
            .unwrap_or("Check symbol or API key.");
        return Err(format!("Failed to fetch stock data. {detail}"));
    };

    let (time, bar) = series
        .iter()
        .max_by(|a, b| a.0.cmp(b.0))
        .ok_or_else(|| format!("No intraday data for {symbol}"))?;
    let price = bar
        .get("1. open")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Malformed bar at {time}"))?;

    Ok(serde_json::json!({
        "symbol": symbol,
        "price": price,
        "time": time,
    }))
}
