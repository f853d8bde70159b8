//! Measurement snapshots from the Open-Meteo air-quality and forecast APIs

use crate::{AirQualityAlertConfig, AirQualityAlertError, Result};
use airquality_common::MeasurementSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error};

const AIR_QUALITY_SERIES: &str =
    "pm2_5,pm10,nitrogen_dioxide,sulphur_dioxide,carbon_monoxide,us_aqi";
const WEATHER_SERIES: &str = "temperature_2m,relative_humidity_2m";

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<MeasurementSnapshot>;
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    #[serde(default)]
    hourly: Map<String, Value>,
}

impl HourlyResponse {
    /// Last non-null value of an hourly series.
    fn latest(&self, series: &str) -> Option<f64> {
        self.hourly
            .get(series)?
            .as_array()?
            .iter()
            .rev()
            .find_map(Value::as_f64)
    }

    fn require(&self, series: &str, source: &str) -> Result<f64> {
        self.latest(series).ok_or_else(|| {
            AirQualityAlertError::MetricsFetch(format!(
                "{} response missing {} data",
                source, series
            ))
        })
    }
}

pub struct OpenMeteoClient {
    client: Client,
    air_quality_url: String,
    weather_url: String,
    population_density: f64,
    timeout_ms: u64,
}

impl OpenMeteoClient {
    pub fn new(
        air_quality_url: impl Into<String>,
        weather_url: impl Into<String>,
        population_density: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AirQualityAlertError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            air_quality_url: air_quality_url.into(),
            weather_url: weather_url.into(),
            population_density,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn from_config(config: &AirQualityAlertConfig) -> Result<Self> {
        Self::new(
            config.air_quality_url.clone(),
            config.weather_url.clone(),
            config.population_density,
            Duration::from_millis(config.metrics_timeout_ms),
        )
    }

    async fn get_hourly(
        &self,
        url: &str,
        series: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<HourlyResponse> {
        let response = self
            .client
            .get(url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("hourly", series.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AirQualityAlertError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AirQualityAlertError::MetricsFetch(format!("request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Open-Meteo error {}: {}", status, body);
            return Err(AirQualityAlertError::MetricsFetch(format!(
                "{} returned status {}",
                url,
                status.as_u16()
            )));
        }

        response.json::<HourlyResponse>().await.map_err(|e| {
            AirQualityAlertError::MetricsFetch(format!("decode response from {}: {}", url, e))
        })
    }
}

#[async_trait]
impl MetricsSource for OpenMeteoClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<MeasurementSnapshot> {
        let air = self
            .get_hourly(&self.air_quality_url, AIR_QUALITY_SERIES, latitude, longitude)
            .await?;
        let weather = self
            .get_hourly(&self.weather_url, WEATHER_SERIES, latitude, longitude)
            .await?;

        let snapshot = MeasurementSnapshot {
            temperature: weather.require("temperature_2m", "weather")?,
            humidity: weather.require("relative_humidity_2m", "weather")?,
            pm2_5: air.require("pm2_5", "air quality")?,
            pm10: air.require("pm10", "air quality")?,
            no2: air.require("nitrogen_dioxide", "air quality")?,
            so2: air.require("sulphur_dioxide", "air quality")?,
            co: air.require("carbon_monoxide", "air quality")?,
            population_density: self.population_density,
            aqi: air.latest("us_aqi"),
        };

        debug!(latitude, longitude, aqi = ?snapshot.aqi, "fetched measurement snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_skips_trailing_nulls() {
        let response: HourlyResponse = serde_json::from_value(json!({
            "hourly": {
                "time": ["2026-01-01T00:00", "2026-01-01T01:00", "2026-01-01T02:00"],
                "pm10": [12.0, 14.5, null],
                "pm2_5": [null, null, null]
            }
        }))
        .unwrap();

        assert_eq!(response.latest("pm10"), Some(14.5));
        assert_eq!(response.latest("pm2_5"), None);
        assert_eq!(response.latest("us_aqi"), None);
        assert!(matches!(
            response.require("pm2_5", "air quality"),
            Err(AirQualityAlertError::MetricsFetch(_))
        ));
    }
}
