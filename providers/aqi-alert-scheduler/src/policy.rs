//! Risk evaluation policy
//!
//! Decides whether a prediction warrants an alert. Evaluation is pure: no I/O,
//! no errors. Input the policy cannot interpret yields [`AlertDecision::NoAlert`]
//! with a reason the caller can log.

use crate::{AirQualityAlertConfig, RiskPolicyKind};
use airquality_common::{
    normalize_label, MeasurementSnapshot, PredictionResult, RiskLevel, RiskSignal, Subscription,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskPolicy {
    /// Alert on `poor` or `hazardous` risk labels.
    Categorical,
    /// Alert when the effective index reaches the subscriber's threshold.
    Numeric { default_threshold: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    Alert(RiskSignal),
    NoAlert(NoAlertReason),
}

impl AlertDecision {
    pub fn is_alert(&self) -> bool {
        matches!(self, AlertDecision::Alert(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoAlertReason {
    /// Recognized category below the alerting level.
    AcceptableRisk(RiskLevel),
    /// Label outside the known set, including empty or missing.
    UnrecognizedRisk(String),
    BelowThreshold { value: f64, threshold: f64 },
    /// Neither a predicted nor a measured index was available.
    MissingIndex,
}

impl fmt::Display for NoAlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoAlertReason::AcceptableRisk(level) => write!(f, "risk level {} is acceptable", level),
            NoAlertReason::UnrecognizedRisk(label) => {
                write!(f, "unrecognized risk level '{}'", label)
            }
            NoAlertReason::BelowThreshold { value, threshold } => {
                write!(f, "index {} below threshold {}", value, threshold)
            }
            NoAlertReason::MissingIndex => f.write_str("no index available"),
        }
    }
}

impl RiskPolicy {
    pub fn from_config(config: &AirQualityAlertConfig) -> Self {
        match config.risk_policy {
            RiskPolicyKind::Categorical => RiskPolicy::Categorical,
            RiskPolicyKind::Numeric => RiskPolicy::Numeric {
                default_threshold: config.default_threshold,
            },
        }
    }

    pub fn evaluate(
        &self,
        prediction: &PredictionResult,
        snapshot: &MeasurementSnapshot,
        subscription: &Subscription,
    ) -> AlertDecision {
        match *self {
            RiskPolicy::Categorical => evaluate_categorical(prediction.risk_level.as_deref()),
            RiskPolicy::Numeric { default_threshold } => {
                let threshold = subscription
                    .threshold
                    .map(f64::from)
                    .unwrap_or(default_threshold);
                match effective_index(prediction, snapshot) {
                    Some(value) if should_alert(value, threshold) => {
                        AlertDecision::Alert(RiskSignal::numeric(value, threshold))
                    }
                    Some(value) => {
                        AlertDecision::NoAlert(NoAlertReason::BelowThreshold { value, threshold })
                    }
                    None => AlertDecision::NoAlert(NoAlertReason::MissingIndex),
                }
            }
        }
    }
}

fn evaluate_categorical(label: Option<&str>) -> AlertDecision {
    let raw = label.unwrap_or_default();
    match RiskLevel::parse(raw) {
        Some(level) if level.requires_alert() => AlertDecision::Alert(RiskSignal::categorical(level)),
        Some(level) => AlertDecision::NoAlert(NoAlertReason::AcceptableRisk(level)),
        None => AlertDecision::NoAlert(NoAlertReason::UnrecognizedRisk(normalize_label(raw))),
    }
}

/// Predicted index, or the measured one when the prediction is absent or
/// exactly zero.
pub fn effective_index(prediction: &PredictionResult, snapshot: &MeasurementSnapshot) -> Option<f64> {
    match prediction.predicted_aqi {
        Some(value) if value != 0.0 && value.is_finite() => Some(value),
        _ => snapshot.aqi.filter(|v| v.is_finite()),
    }
}

pub fn should_alert(value: f64, threshold: f64) -> bool {
    value >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn subscription(threshold: Option<u32>) -> Subscription {
        Subscription {
            owner_id: 1,
            latitude: 52.5,
            longitude: 13.4,
            threshold,
            email: "a@x.com".to_string(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot(aqi: Option<f64>) -> MeasurementSnapshot {
        MeasurementSnapshot {
            aqi,
            ..Default::default()
        }
    }

    #[test]
    fn test_categorical_alerts_on_poor_and_hazardous_any_case() {
        for label in ["poor", "POOR", "  Poor ", "hazardous", "Hazardous\n"] {
            let decision = RiskPolicy::Categorical.evaluate(
                &PredictionResult::from_risk_level(label),
                &snapshot(None),
                &subscription(None),
            );
            assert!(decision.is_alert(), "expected alert for {:?}", label);
        }
    }

    #[test]
    fn test_categorical_moderate_with_trailing_space_is_acceptable() {
        let decision = RiskPolicy::Categorical.evaluate(
            &PredictionResult::from_risk_level("Moderate "),
            &snapshot(None),
            &subscription(None),
        );
        assert_eq!(
            decision,
            AlertDecision::NoAlert(NoAlertReason::AcceptableRisk(RiskLevel::Moderate))
        );
    }

    #[test]
    fn test_categorical_unknown_labels_do_not_alert() {
        for label in ["", "   ", "very bad", "unhealthy"] {
            let decision = RiskPolicy::Categorical.evaluate(
                &PredictionResult::from_risk_level(label),
                &snapshot(Some(500.0)),
                &subscription(None),
            );
            assert!(matches!(
                decision,
                AlertDecision::NoAlert(NoAlertReason::UnrecognizedRisk(_))
            ));
        }

        let decision = RiskPolicy::Categorical.evaluate(
            &PredictionResult::from_index(Some(300.0)),
            &snapshot(None),
            &subscription(None),
        );
        assert_eq!(
            decision,
            AlertDecision::NoAlert(NoAlertReason::UnrecognizedRisk(String::new()))
        );
    }

    #[test]
    fn test_numeric_threshold_equality_alerts() {
        let policy = RiskPolicy::Numeric {
            default_threshold: 100.0,
        };
        let decision = policy.evaluate(
            &PredictionResult::from_index(Some(100.0)),
            &snapshot(None),
            &subscription(Some(100)),
        );
        assert_eq!(
            decision,
            AlertDecision::Alert(RiskSignal::numeric(100.0, 100.0))
        );

        let decision = policy.evaluate(
            &PredictionResult::from_index(Some(99.9)),
            &snapshot(None),
            &subscription(Some(100)),
        );
        assert_eq!(
            decision,
            AlertDecision::NoAlert(NoAlertReason::BelowThreshold {
                value: 99.9,
                threshold: 100.0
            })
        );
    }

    #[test]
    fn test_numeric_zero_prediction_falls_back_to_measured_index() {
        let policy = RiskPolicy::Numeric {
            default_threshold: 100.0,
        };
        let decision = policy.evaluate(
            &PredictionResult::from_index(Some(0.0)),
            &snapshot(Some(120.0)),
            &subscription(Some(100)),
        );
        assert_eq!(
            decision,
            AlertDecision::Alert(RiskSignal::numeric(120.0, 100.0))
        );
    }

    #[test]
    fn test_numeric_uses_default_threshold_when_unset() {
        let policy = RiskPolicy::Numeric {
            default_threshold: 150.0,
        };
        let decision = policy.evaluate(
            &PredictionResult::from_index(Some(120.0)),
            &snapshot(None),
            &subscription(None),
        );
        assert!(!decision.is_alert());
    }

    #[test]
    fn test_numeric_missing_index_does_not_alert() {
        let policy = RiskPolicy::Numeric {
            default_threshold: 100.0,
        };
        let decision = policy.evaluate(
            &PredictionResult::default(),
            &snapshot(None),
            &subscription(Some(1)),
        );
        assert_eq!(decision, AlertDecision::NoAlert(NoAlertReason::MissingIndex));
    }

    #[test]
    fn test_from_config_selects_variant() {
        let config = AirQualityAlertConfig {
            risk_policy: RiskPolicyKind::Numeric,
            default_threshold: 80.0,
            ..Default::default()
        };
        assert_eq!(
            RiskPolicy::from_config(&config),
            RiskPolicy::Numeric {
                default_threshold: 80.0
            }
        );
        assert_eq!(
            RiskPolicy::from_config(&AirQualityAlertConfig::default()),
            RiskPolicy::Categorical
        );
    }
}
