use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alerting configuration for one owner. At most one exists per `owner_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub owner_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Numeric alert condition; only consulted by the numeric policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    /// Destination address. Empty means "evaluate, but never deliver".
    #[serde(default)]
    pub email: String,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn has_destination(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Subscribe request as published by the API gateway after authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequestV1 {
    pub schema_version: String,
    pub request_id: String,
    /// Authenticated owner identity; zero means the gateway attached none.
    #[serde(default)]
    pub owner_id: u64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub email: String,
    pub requested_at: DateTime<Utc>,
}

pub fn subscribe_request_schema_version_v1() -> String {
    "airquality_subscribe_v1".to_string()
}

impl SubscribeRequestV1 {
    /// Build the record to persist. Callers validate first.
    pub fn into_subscription(self, now: DateTime<Utc>) -> Subscription {
        Subscription {
            owner_id: self.owner_id,
            latitude: self.latitude,
            longitude: self.longitude,
            threshold: self.threshold,
            email: self.email.trim().to_string(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequestV1 {
    pub schema_version: String,
    pub request_id: String,
    #[serde(default)]
    pub owner_id: u64,
    pub requested_at: DateTime<Utc>,
}

pub fn unsubscribe_request_schema_version_v1() -> String {
    "airquality_unsubscribe_v1".to_string()
}
