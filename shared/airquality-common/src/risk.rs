use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Categorical risk classification produced by the predictor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Good,
    Moderate,
    Poor,
    Hazardous,
}

impl RiskLevel {
    /// Parses a predictor label, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "good" => Some(RiskLevel::Good),
            "moderate" => Some(RiskLevel::Moderate),
            "poor" => Some(RiskLevel::Poor),
            "hazardous" => Some(RiskLevel::Hazardous),
            _ => None,
        }
    }

    pub fn requires_alert(self) -> bool {
        matches!(self, RiskLevel::Poor | RiskLevel::Hazardous)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Good => "good",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Poor => "poor",
            RiskLevel::Hazardous => "hazardous",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// What the policy hands to the dispatcher when it decides to alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskSignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<RiskLevel>,
    /// Effective index the decision was based on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl RiskSignal {
    pub fn categorical(level: RiskLevel) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn numeric(index: f64, threshold: f64) -> Self {
        Self {
            level: None,
            index: Some(index),
            threshold: Some(threshold),
        }
    }

    /// Upper-case label for subjects and headlines.
    pub fn headline(&self) -> String {
        self.level
            .map(|l| l.as_str().to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

/// One alert ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertNotice {
    /// Stable per (owner, evaluation time); used as an idempotency key.
    pub alert_id: Uuid,
    pub owner_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub signal: RiskSignal,
    pub evaluated_at: DateTime<Utc>,
}

impl AlertNotice {
    pub fn new(
        owner_id: u64,
        latitude: f64,
        longitude: f64,
        signal: RiskSignal,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: alert_id(owner_id, evaluated_at),
            owner_id,
            latitude,
            longitude,
            signal,
            evaluated_at,
        }
    }
}

pub fn alert_id(owner_id: u64, evaluated_at: DateTime<Utc>) -> Uuid {
    let input = format!("aqi-alert:{}:{}", owner_id, evaluated_at.to_rfc3339());
    Uuid::new_v5(&Uuid::NAMESPACE_URL, input.as_bytes())
}
