//! Configuration for the air-quality alert scheduler
//!
//! One [`AirQualityAlertConfig`] is built at startup, either from the process
//! environment or from the wasmCloud HostData property map, and handed to
//! every component that needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_INTERVAL_MINUTES: i64 = 30;
const OPEN_METEO_AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Which prediction field a deployment treats as authoritative.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskPolicyKind {
    #[default]
    Categorical,
    Numeric,
}

impl FromStr for RiskPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categorical" => Ok(RiskPolicyKind::Categorical),
            "numeric" => Ok(RiskPolicyKind::Numeric),
            other => Err(format!("unknown risk policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AirQualityAlertConfig {
    /// Redis connection URL (subscription store)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis connection pool size
    #[serde(default = "default_pool_size")]
    pub redis_pool_size: usize,

    #[serde(default)]
    pub store_backend: StoreBackend,

    /// NATS connection URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying subscribe/unsubscribe requests
    #[serde(default = "default_subscription_stream_name")]
    pub subscription_stream_name: String,

    /// Minutes between ticks; zero or negative falls back to 30
    #[serde(default = "default_interval_minutes")]
    pub notification_interval_min: i64,

    /// Wait after a failed subscription enumeration before retrying
    #[serde(default = "default_store_retry_backoff_secs")]
    pub store_retry_backoff_secs: u64,

    /// Subscribers evaluated concurrently within one tick (1 = sequential)
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,

    #[serde(default)]
    pub risk_policy: RiskPolicyKind,

    /// Numeric threshold used when a subscriber did not set one
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: String,

    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    #[serde(default = "default_http_timeout_ms")]
    pub metrics_timeout_ms: u64,

    /// The metrics API has no population data; this value is used instead
    #[serde(default = "default_population_density")]
    pub population_density: f64,

    /// Prediction service base URL; unset means raw index pass-through
    #[serde(default)]
    pub ml_service_url: Option<String>,

    #[serde(default = "default_ml_predict_path")]
    pub ml_predict_path: String,

    #[serde(default = "default_http_timeout_ms")]
    pub ml_timeout_ms: u64,
}

impl AirQualityAlertConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Load configuration from wasmCloud properties HashMap
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, String> {
        let defaults = Self::default();

        let store_backend = match props.get("store_backend") {
            Some(raw) => raw.parse()?,
            None => defaults.store_backend,
        };
        let risk_policy = match props.get("risk_policy") {
            Some(raw) => raw.parse()?,
            None => defaults.risk_policy,
        };

        Ok(Self {
            redis_url: props.get("redis_url").cloned().unwrap_or(defaults.redis_url),
            redis_pool_size: parse_prop(props, "redis_pool_size", defaults.redis_pool_size)?,
            store_backend,
            nats_url: props.get("nats_url").cloned().unwrap_or(defaults.nats_url),
            subscription_stream_name: props
                .get("subscription_stream_name")
                .cloned()
                .unwrap_or(defaults.subscription_stream_name),
            notification_interval_min: parse_prop(
                props,
                "notification_interval_min",
                defaults.notification_interval_min,
            )?,
            store_retry_backoff_secs: parse_prop(
                props,
                "store_retry_backoff_secs",
                defaults.store_retry_backoff_secs,
            )?,
            max_concurrent_evaluations: parse_prop(
                props,
                "max_concurrent_evaluations",
                defaults.max_concurrent_evaluations,
            )?,
            risk_policy,
            default_threshold: parse_prop(props, "default_threshold", defaults.default_threshold)?,
            air_quality_url: props
                .get("air_quality_url")
                .cloned()
                .unwrap_or(defaults.air_quality_url),
            weather_url: props
                .get("weather_url")
                .cloned()
                .unwrap_or(defaults.weather_url),
            metrics_timeout_ms: parse_prop(
                props,
                "metrics_timeout_ms",
                defaults.metrics_timeout_ms,
            )?,
            population_density: parse_prop(
                props,
                "population_density",
                defaults.population_density,
            )?,
            ml_service_url: props.get("ml_service_url").cloned(),
            ml_predict_path: props
                .get("ml_predict_path")
                .cloned()
                .unwrap_or(defaults.ml_predict_path),
            ml_timeout_ms: parse_prop(props, "ml_timeout_ms", defaults.ml_timeout_ms)?,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store_backend == StoreBackend::Redis && self.redis_url.trim().is_empty() {
            return Err("redis_url is required for the redis store backend".to_string());
        }
        if self.max_concurrent_evaluations == 0 {
            return Err("max_concurrent_evaluations must be greater than 0".to_string());
        }
        if self.store_retry_backoff_secs == 0 {
            return Err("store_retry_backoff_secs must be greater than 0".to_string());
        }
        if !self.default_threshold.is_finite() {
            return Err("default_threshold must be a finite number".to_string());
        }
        if let Some(url) = self.ml_service_url() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("ml_service_url must be an http(s) URL: {}", url));
            }
        }
        Ok(())
    }

    /// Tick interval, with non-positive values mapped to the 30 minute default.
    pub fn poll_interval(&self) -> Duration {
        let minutes = if self.notification_interval_min <= 0 {
            DEFAULT_INTERVAL_MINUTES
        } else {
            self.notification_interval_min
        };
        Duration::from_secs((minutes as u64).saturating_mul(60))
    }

    pub fn store_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.store_retry_backoff_secs)
    }

    /// Configured prediction service URL, ignoring blank values.
    pub fn ml_service_url(&self) -> Option<&str> {
        self.ml_service_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl Default for AirQualityAlertConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            redis_pool_size: default_pool_size(),
            store_backend: StoreBackend::default(),
            nats_url: default_nats_url(),
            subscription_stream_name: default_subscription_stream_name(),
            notification_interval_min: default_interval_minutes(),
            store_retry_backoff_secs: default_store_retry_backoff_secs(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            risk_policy: RiskPolicyKind::default(),
            default_threshold: default_threshold(),
            air_quality_url: default_air_quality_url(),
            weather_url: default_weather_url(),
            metrics_timeout_ms: default_http_timeout_ms(),
            population_density: default_population_density(),
            ml_service_url: None,
            ml_predict_path: default_ml_predict_path(),
            ml_timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Absent keys take the default; present but unparseable values are rejected.
fn parse_prop<T: FromStr>(
    props: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, String> {
    match props.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subscription_stream_name() -> String {
    airquality_common::SUBSCRIPTION_STREAM.to_string()
}

fn default_interval_minutes() -> i64 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_store_retry_backoff_secs() -> u64 {
    60
}

fn default_max_concurrent_evaluations() -> usize {
    1
}

fn default_threshold() -> f64 {
    100.0
}

fn default_air_quality_url() -> String {
    OPEN_METEO_AIR_QUALITY_URL.to_string()
}

fn default_weather_url() -> String {
    OPEN_METEO_FORECAST_URL.to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_population_density() -> f64 {
    497.0
}

fn default_ml_predict_path() -> String {
    "/predict".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_positive_interval_defaults_to_thirty_minutes() {
        for minutes in [0, -5] {
            let config = AirQualityAlertConfig {
                notification_interval_min: minutes,
                ..Default::default()
            };
            assert_eq!(config.poll_interval(), Duration::from_secs(30 * 60));
        }

        let config = AirQualityAlertConfig {
            notification_interval_min: 5,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_from_properties() {
        let mut props = HashMap::new();
        props.insert("store_backend".to_string(), "memory".to_string());
        props.insert("risk_policy".to_string(), "Numeric".to_string());
        props.insert("notification_interval_min".to_string(), "15".to_string());
        props.insert("ml_service_url".to_string(), "http://ml:8000".to_string());
        props.insert("default_threshold".to_string(), "120.5".to_string());

        let config = AirQualityAlertConfig::from_properties(&props).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.risk_policy, RiskPolicyKind::Numeric);
        assert_eq!(config.poll_interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.ml_service_url(), Some("http://ml:8000"));
        assert_eq!(config.default_threshold, 120.5);
        assert_eq!(config.redis_pool_size, 10);
        assert_eq!(config.store_retry_backoff(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_properties_rejects_unparseable_numbers() {
        for (key, raw) in [
            ("default_threshold", "not-a-number"),
            ("notification_interval_min", "soon"),
            ("max_concurrent_evaluations", "-1"),
            ("metrics_timeout_ms", "5s"),
        ] {
            let mut props = HashMap::new();
            props.insert(key.to_string(), raw.to_string());
            let err = AirQualityAlertConfig::from_properties(&props).unwrap_err();
            assert!(err.contains(key), "{}", err);
        }
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = AirQualityAlertConfig {
            notification_interval_min: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_from_properties_rejects_unknown_policy() {
        let mut props = HashMap::new();
        props.insert("risk_policy".to_string(), "heuristic".to_string());
        assert!(AirQualityAlertConfig::from_properties(&props).is_err());
    }

    #[test]
    fn test_blank_ml_url_is_unset() {
        let config = AirQualityAlertConfig {
            ml_service_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.ml_service_url(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AirQualityAlertConfig {
            max_concurrent_evaluations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AirQualityAlertConfig {
            ml_service_url: Some("ml:8000".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AirQualityAlertConfig {
            redis_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
