use airquality_common::{AlertNotice, DispatchError};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

const HTML_TEMPLATE: &str = "aqi_alert_html";
const TEXT_TEMPLATE: &str = "aqi_alert_text";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text_content: String,
    pub html_content: Option<String>,
    pub reply_to: Option<String>,
    pub headers: HashMap<String, String>,
}

pub struct EmailFormatter {
    templates: Handlebars<'static>,
    default_from: String,
}

impl EmailFormatter {
    pub fn new(default_from: impl Into<String>) -> Result<Self, DispatchError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(false);

        templates
            .register_template_string(
                HTML_TEMPLATE,
                include_str!("../templates/aqi_alert.html.hbs"),
            )
            .map_err(|e| DispatchError::InvalidConfiguration(format!("html template: {}", e)))?;
        templates
            .register_template_string(
                TEXT_TEMPLATE,
                include_str!("../templates/aqi_alert.txt.hbs"),
            )
            .map_err(|e| DispatchError::InvalidConfiguration(format!("text template: {}", e)))?;

        Ok(Self {
            templates,
            default_from: default_from.into(),
        })
    }

    pub fn format_alert(
        &self,
        destination: &str,
        notice: &AlertNotice,
    ) -> Result<EmailPayload, DispatchError> {
        let signal = &notice.signal;
        let context = json!({
            "headline": signal.headline(),
            "index": signal.index.map(|v| format!("{:.0}", v)),
            "threshold": signal.threshold.map(|v| format!("{:.0}", v)),
            "latitude": format!("{:.4}", notice.latitude),
            "longitude": format!("{:.4}", notice.longitude),
            "evaluated_at": notice.evaluated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        });

        let html_content = self
            .templates
            .render(HTML_TEMPLATE, &context)
            .map_err(|e| DispatchError::MalformedPayload(format!("render html: {}", e)))?;
        let text_content = self
            .templates
            .render(TEXT_TEMPLATE, &context)
            .map_err(|e| DispatchError::MalformedPayload(format!("render text: {}", e)))?;

        let mut headers = HashMap::new();
        headers.insert("X-Alert-Id".to_string(), notice.alert_id.to_string());

        let payload = EmailPayload {
            to: destination.trim().to_string(),
            from: self.default_from.clone(),
            subject: format!("Air Quality Alert: {}", signal.headline()),
            text_content,
            html_content: Some(html_content),
            reply_to: None,
            headers,
        };

        self.validate_payload(&payload)?;

        Ok(payload)
    }

    pub fn validate_payload(&self, payload: &EmailPayload) -> Result<(), DispatchError> {
        if !self.is_valid_email(&payload.to) {
            return Err(DispatchError::MalformedPayload(format!(
                "Invalid email address: {}",
                payload.to
            )));
        }

        if !self.is_valid_email(&payload.from) {
            return Err(DispatchError::MalformedPayload(format!(
                "Invalid email address: {}",
                payload.from
            )));
        }

        if payload.subject.is_empty() {
            return Err(DispatchError::MalformedPayload(
                "Email subject cannot be empty".to_string(),
            ));
        }

        if payload.text_content.is_empty() && payload.html_content.is_none() {
            return Err(DispatchError::MalformedPayload(
                "Email must have either text or HTML content".to_string(),
            ));
        }

        Ok(())
    }

    fn is_valid_email(&self, email: &str) -> bool {
        email_address::EmailAddress::is_valid(email)
    }
}
