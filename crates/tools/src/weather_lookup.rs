//! Weather lookup tool backed by the OpenWeatherMap current-weather API.

use async_trait::async_trait;
use serde::Deserialize;
use toolloop_config::WeatherConfig;
use toolloop_core::action::Arguments;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolOutput};
use tracing::debug;

use crate::upstream_error;

pub struct WeatherLookupTool {
    config: WeatherConfig,
    client: reqwest::Client,
}

impl WeatherLookupTool {
    pub fn new(config: WeatherConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Fetch current weather for a city. Returns the city name, temperature, weather conditions, and humidity."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::required("city", ParameterKind::String, "Name of the city, e.g. 'London'"),
            Parameter::optional(
                "units",
                ParameterKind::String,
                "Temperature units: metric, imperial or standard",
            ),
        ])
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let city = arguments
            .get("city")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().into(),
                reason: "missing 'city' argument".into(),
            })?;
        let units = arguments
            .get("units")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.config.units);

        let api_key = self.config.api_key.as_deref().ok_or_else(|| ToolError::NotConfigured {
            tool_name: self.name().into(),
            reason: "no OpenWeatherMap API key (set OPENWEATHER_API_KEY)".into(),
        })?;

        debug!(tool = self.name(), city, units, "Fetching weather");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "get_weather".into(),
            reason,
        };

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[("q", city), ("appid", api_key), ("units", units)])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(upstream_error(self.name(), status.as_u16(), &body));
        }

        let report = summarize(&body).map_err(failed)?;
        Ok(ToolOutput::Structured(report))
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

/// Reduce an OpenWeatherMap reply to the fields the agent sees.
fn summarize(body: &str) -> Result<serde_json::Value, String> {
    let data: CurrentWeather =
        serde_json::from_str(body).map_err(|e| format!("unexpected weather response: {e}"))?;
    let conditions = data
        .weather
        .first()
        .map(|c| c.description.clone())
        .unwrap_or_default();

    Ok(serde_json::json!({
        "City": data.name,
        "Temperature": data.main.temp,
        "Weather": conditions,
        "Humidity": data.main.humidity,
    }))
}
