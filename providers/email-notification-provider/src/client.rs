use crate::formatter::EmailPayload;
use airquality_common::DispatchError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendResponseWrapper {
    pub message_id: Option<String>,
    pub status_code: u16,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    #[serde(default)]
    message: String,
}

pub struct ResendClient {
    client: Client,
    api_key: String,
    base_url: String,
    default_from_name: String,
}

impl ResendClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_from_name: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DispatchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
        })?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let default_from_name = default_from_name.unwrap_or_else(|| "Clean Breathing".to_string());

        Ok(Self {
            client,
            api_key,
            base_url,
            default_from_name,
        })
    }

    /// Sends one email. `idempotency_key` lets Resend drop duplicate
    /// submissions of the same alert.
    pub async fn send(
        &self,
        payload: EmailPayload,
        idempotency_key: Option<&str>,
    ) -> Result<ResendResponseWrapper, DispatchError> {
        let request = self.build_request(payload);

        let mut builder = self
            .client
            .post(format!("{}/emails", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder.json(&request).send().await.map_err(|e| {
            error!("Failed to send email request: {}", e);
            if e.is_timeout() {
                DispatchError::NetworkTimeout
            } else {
                DispatchError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                let resend_response: ResendResponse = response.json().await.map_err(|e| {
                    error!("Failed to parse Resend response: {}", e);
                    DispatchError::ExternalServiceError(format!("Invalid response format: {}", e))
                })?;
                debug!("Email sent successfully with ID: {}", resend_response.id);
                Ok(ResendResponseWrapper {
                    message_id: Some(resend_response.id),
                    status_code: 200,
                    message: Some("success".to_string()),
                })
            }
            StatusCode::UNAUTHORIZED => {
                error!("Authentication failed with Resend");
                Err(DispatchError::InvalidAuthentication)
            }
            StatusCode::FORBIDDEN => {
                let error_body = response.text().await.unwrap_or_default();
                error!("Forbidden - domain may not be verified: {}", error_body);
                Err(DispatchError::ExternalServiceError(
                    "Domain not verified or insufficient permissions".to_string(),
                ))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(60);

                warn!("Rate limit exceeded, retry after {} seconds", retry_after);
                Err(DispatchError::RateLimitExceeded {
                    retry_after: chrono::Duration::seconds(retry_after),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let error_body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ResendError>(&error_body)
                    .map(|e| e.message)
                    .unwrap_or_else(|_| "Invalid email request".to_string());
                error!("Resend rejected email ({}): {}", status, message);
                Err(DispatchError::MalformedPayload(message))
            }
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE => {
                error!("Resend service error: {}", status);
                Err(DispatchError::ServiceUnavailable)
            }
            _ => {
                error!("Unexpected response status: {}", status);
                Err(DispatchError::ExternalServiceError(format!(
                    "Unexpected status code: {}",
                    status
                )))
            }
        }
    }

    fn build_request(&self, payload: EmailPayload) -> ResendRequest {
        // Resend uses "Name <email>" format for from address
        let from = format!("{} <{}>", self.default_from_name, payload.from);

        ResendRequest {
            from,
            to: vec![payload.to],
            subject: payload.subject,
            text: Some(payload.text_content),
            html: payload.html_content,
            reply_to: payload.reply_to,
            headers: payload.headers,
        }
    }
}
