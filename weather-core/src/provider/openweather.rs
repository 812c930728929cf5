use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{Kelvin, Location, ProviderError, provider::truncate_body};

use super::{HTTP_TIMEOUT, ProviderId, TemperatureProvider};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// OpenWeatherMap current conditions. Without a `units` parameter the API
/// already answers in Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build OpenWeather HTTP client")?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http })
    }
}

const NAME: &str = ProviderId::OpenWeather.as_str();

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
}

#[derive(Debug, Deserialize)]
struct OwErrorResponse {
    message: Option<String>,
}

#[async_trait]
impl TemperatureProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn measure(&self, location: &Location) -> Result<Kelvin, ProviderError> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", location.query_string().as_str()), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = NAME, error = %e, "request failed");
                ProviderError::transport(NAME, e)
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            tracing::warn!(provider = NAME, error = %e, "failed to read response body");
            ProviderError::transport(NAME, e)
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<OwErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| truncate_body(&body));

            tracing::warn!(provider = NAME, %status, %message, "upstream error");
            return Err(ProviderError::upstream(NAME, Some(status.as_u16()), message));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(provider = NAME, error = %e, "undecodable response");
            ProviderError::decode(NAME, e)
        })?;

        let kelvin = Kelvin(parsed.main.temp);
        tracing::debug!(provider = NAME, city = %parsed.name, %kelvin, "measured");

        Ok(kelvin)
    }
}
