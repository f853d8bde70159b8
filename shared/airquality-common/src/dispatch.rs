use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::AlertNotice;

/// Delivery channel for alerts.
///
/// Implementations own their own timeouts; a timed out delivery is reported
/// as an ordinary error.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Channel name used in logs.
    fn channel(&self) -> &'static str;

    async fn send_alert(
        &self,
        destination: &str,
        notice: &AlertNotice,
    ) -> Result<DispatchReceipt, DispatchError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchReceipt {
    pub message_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    // Retryable errors
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Network timeout")]
    NetworkTimeout,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Network error: {0}")]
    NetworkError(String),

    // Non-retryable errors
    #[error("Invalid API key or authentication")]
    InvalidAuthentication,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimitExceeded { .. }
                | DispatchError::NetworkTimeout
                | DispatchError::ServiceUnavailable
                | DispatchError::NetworkError(_)
        )
    }
}

/// Dispatcher used when no delivery channel is configured: alerts are only
/// logged.
#[derive(Debug, Clone, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl AlertDispatcher for LoggingDispatcher {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn send_alert(
        &self,
        destination: &str,
        notice: &AlertNotice,
    ) -> Result<DispatchReceipt, DispatchError> {
        info!(
            owner_id = notice.owner_id,
            alert_id = %notice.alert_id,
            "Delivery channel not configured; skipping alert {} to {} (index={:?})",
            notice.signal.headline(),
            destination,
            notice.signal.index
        );
        Ok(DispatchReceipt::default())
    }
}
