//! `getWeather`: current conditions and forecast from Open-Meteo.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use rc_domain::config::WeatherConfig;
use rc_domain::tool::ToolDefinition;

use super::{parse_args, Tool, ToolContext, GET_WEATHER};

#[derive(Debug, Deserialize)]
struct WeatherInput {
    latitude: f64,
    longitude: f64,
}

pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
}

impl WeatherTool {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build reqwest client for getWeather")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_WEATHER.into(),
            description: "Get the current weather at a location".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number" },
                    "longitude": { "type": "number" }
                },
                "required": ["latitude", "longitude"]
            }),
        }
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value> {
        let input: WeatherInput = parse_args(args)?;
        let url = format!("{}/forecast", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("latitude", input.latitude.to_string()),
                ("longitude", input.longitude.to_string()),
                ("current", "temperature_2m".to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .context("weather request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("weather service returned {status}");
        }
        resp.json::<Value>()
            .await
            .context("weather response was not JSON")
    }
}
