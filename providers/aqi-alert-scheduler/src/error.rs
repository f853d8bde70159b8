//! Error types for the air-quality alert scheduler

use airquality_common::{DispatchError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AirQualityAlertError {
    #[error("Redis connection error: {0}")]
    RedisConnection(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Metrics fetch failed: {0}")]
    MetricsFetch(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Invalid subscription request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Alert dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("NATS connection error: {0}")]
    NatsConnection(String),
}

impl AirQualityAlertError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AirQualityAlertError::RedisConnection(_)
            | AirQualityAlertError::StoreUnavailable(_)
            | AirQualityAlertError::MetricsFetch(_)
            | AirQualityAlertError::Prediction(_)
            | AirQualityAlertError::Timeout { .. }
            | AirQualityAlertError::NatsConnection(_) => true,
            AirQualityAlertError::Dispatch(e) => e.is_retryable(),
            AirQualityAlertError::Configuration(_)
            | AirQualityAlertError::Serialization(_)
            | AirQualityAlertError::Validation(_) => false,
        }
    }
}
