use crate::{client::ResendClient, config::EmailConfig, formatter::EmailFormatter};
use airquality_common::{AlertDispatcher, AlertNotice, DispatchError, DispatchReceipt};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Delivers alerts as email through Resend.
///
/// No retries: a failed delivery is reported to the caller, and the
/// subscriber gets another chance on the next evaluation.
pub struct EmailAlertDispatcher {
    client: ResendClient,
    formatter: EmailFormatter,
}

impl EmailAlertDispatcher {
    pub fn new(config: &EmailConfig) -> Result<Self, DispatchError> {
        config.validate().map_err(|e| {
            DispatchError::InvalidConfiguration(format!("Config validation failed: {}", e))
        })?;

        let client = ResendClient::new(
            config.resend_api_key.clone(),
            config.resend_base_url.clone(),
            Some(config.default_from_name.clone()),
            Duration::from_millis(config.request_timeout_ms),
        )?;
        let formatter = EmailFormatter::new(config.default_from_email.clone())?;

        info!(
            "Email alert dispatcher ready (from: {} <{}>)",
            config.default_from_name, config.default_from_email
        );

        Ok(Self { client, formatter })
    }
}

#[async_trait]
impl AlertDispatcher for EmailAlertDispatcher {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send_alert(
        &self,
        destination: &str,
        notice: &AlertNotice,
    ) -> Result<DispatchReceipt, DispatchError> {
        let payload = self.formatter.format_alert(destination, notice)?;
        debug!(
            owner_id = notice.owner_id,
            "Sending '{}' to {}", payload.subject, payload.to
        );

        let alert_id = notice.alert_id.to_string();
        let response = self.client.send(payload, Some(&alert_id)).await?;

        Ok(DispatchReceipt {
            message_id: response.message_id,
        })
    }
}
