use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{Kelvin, Location, ProviderError, provider::truncate_body};

use super::{HTTP_TIMEOUT, ProviderId, TemperatureProvider};

const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com";

/// WeatherAPI.com current conditions, reported in Celsius and converted here.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build WeatherAPI HTTP client")?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http })
    }
}

const NAME: &str = ProviderId::WeatherApi.as_str();

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}

#[async_trait]
impl TemperatureProvider for WeatherApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn measure(&self, location: &Location) -> Result<Kelvin, ProviderError> {
        let url = format!("{}/v1/current.json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location.query_string().as_str())])
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
            let message = serde_json::from_str::<WaErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_body(&body));

            tracing::warn!(provider = NAME, %status, %message, "upstream error");
            return Err(ProviderError::upstream(NAME, Some(status.as_u16()), message));
        }

        let parsed: WaResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(provider = NAME, error = %e, "undecodable response");
            ProviderError::decode(NAME, e)
        })?;

        let kelvin = Kelvin::from_celsius(parsed.current.temp_c);
        tracing::debug!(provider = NAME, city = %parsed.location.name, %kelvin, "measured");

        Ok(kelvin)
    }
}
