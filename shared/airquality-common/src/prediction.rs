use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result returned by the risk predictor for one snapshot.
///
/// Which field is authoritative is a deployment decision made by the
/// configured risk policy, not by this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_aqi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl PredictionResult {
    pub fn from_index(predicted_aqi: Option<f64>) -> Self {
        Self {
            predicted_aqi,
            ..Default::default()
        }
    }

    pub fn from_risk_level(risk_level: impl Into<String>) -> Self {
        Self {
            risk_level: Some(risk_level.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_response() {
        let raw = json!({
            "predicted_aqi": 87.4,
            "risk_level": "Moderate",
            "meta": {"model": "xgb-v3"}
        });

        let prediction: PredictionResult = serde_json::from_value(raw).unwrap();
        assert_eq!(prediction.predicted_aqi, Some(87.4));
        assert_eq!(prediction.risk_level.as_deref(), Some("Moderate"));
        assert_eq!(prediction.meta.unwrap()["model"], "xgb-v3");
    }

    #[test]
    fn test_deserialize_category_only() {
        let prediction: PredictionResult =
            serde_json::from_value(json!({"risk_level": "poor"})).unwrap();
        assert_eq!(prediction.predicted_aqi, None);
        assert_eq!(prediction.risk_level.as_deref(), Some("poor"));
    }
}
