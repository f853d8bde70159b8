use crate::{AirQualityAlertError, Result};
use airquality_common::{MeasurementSnapshot, PredictionResult, Subscription};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_PREDICT_PATH: &str = "/predict";

/// Turns a measurement snapshot into a risk estimate.
#[async_trait]
pub trait RiskPredictor: Send + Sync {
    async fn predict(
        &self,
        subscription: &Subscription,
        snapshot: &MeasurementSnapshot,
    ) -> Result<PredictionResult>;
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    latitude: f64,
    longitude: f64,
    metrics: &'a MeasurementSnapshot,
}

/// HTTP client for the external ML prediction service.
pub struct MlServiceClient {
    client: Client,
    predict_url: String,
    timeout_ms: u64,
}

impl MlServiceClient {
    pub fn new(base_url: &str, predict_path: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(AirQualityAlertError::Configuration(
                "ml service base URL is required".to_string(),
            ));
        }

        let predict_path = match predict_path.trim() {
            "" => DEFAULT_PREDICT_PATH.to_string(),
            path if path.starts_with('/') => path.to_string(),
            path => format!("/{}", path),
        };

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AirQualityAlertError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            predict_url: format!("{}{}", base_url, predict_path),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }
}

#[async_trait]
impl RiskPredictor for MlServiceClient {
    async fn predict(
        &self,
        subscription: &Subscription,
        snapshot: &MeasurementSnapshot,
    ) -> Result<PredictionResult> {
        if let Some(feature) = snapshot.first_non_finite_feature() {
            return Err(AirQualityAlertError::Prediction(format!(
                "feature {} is not a finite number",
                feature
            )));
        }

        let request = PredictionRequest {
            latitude: subscription.latitude,
            longitude: subscription.longitude,
            metrics: snapshot,
        };

        let response = self
            .client
            .post(&self.predict_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AirQualityAlertError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AirQualityAlertError::Prediction(format!("ml request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            error!("ML service error: status {}", status);
            return Err(AirQualityAlertError::Prediction(format!(
                "ml service error: status {}",
                status.as_u16()
            )));
        }

        let prediction = response.json::<PredictionResult>().await.map_err(|e| {
            AirQualityAlertError::Prediction(format!("decode ml response: {}", e))
        })?;

        debug!(
            owner_id = subscription.owner_id,
            predicted_aqi = ?prediction.predicted_aqi,
            risk_level = ?prediction.risk_level,
            "prediction received"
        );
        Ok(prediction)
    }
}

/// Used when no prediction service is configured: the raw measured index is
/// reported as the prediction and no category is produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughPredictor;

#[async_trait]
impl RiskPredictor for PassthroughPredictor {
    async fn predict(
        &self,
        _subscription: &Subscription,
        snapshot: &MeasurementSnapshot,
    ) -> Result<PredictionResult> {
        Ok(PredictionResult::from_index(snapshot.aqi))
    }
}
