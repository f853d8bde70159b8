use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_FROM_EMAIL: &str = "alerts@cleanbreathing.app";
const DEFAULT_FROM_NAME: &str = "Clean Breathing";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub resend_base_url: Option<String>,
    pub default_from_email: String,
    pub default_from_name: String,
    /// Upper bound for one delivery request, connection included.
    pub request_timeout_ms: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            resend_base_url: None,
            default_from_email: DEFAULT_FROM_EMAIL.to_string(),
            default_from_name: DEFAULT_FROM_NAME.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl EmailConfig {
    /// Create configuration from a properties map (for wasmCloud HostData)
    pub fn from_properties(
        props: &std::collections::HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::from_properties_if_configured(props)?
            .ok_or_else(|| ConfigError::Message("resend_api_key is required".to_string()))
    }

    /// `Ok(None)` when the map carries no Resend API key. Any other problem
    /// with the properties is an error.
    pub fn from_properties_if_configured(
        props: &std::collections::HashMap<String, String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(resend_api_key) = props
            .get("resend_api_key")
            .or_else(|| props.get("RESEND_API_KEY"))
            .filter(|key| !key.is_empty())
            .cloned()
        else {
            return Ok(None);
        };

        let request_timeout_ms = match props.get("email_timeout_ms") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::Message(format!("invalid email_timeout_ms: {}", raw))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        Ok(Some(Self {
            resend_api_key,
            resend_base_url: props.get("resend_base_url").cloned(),
            default_from_email: props
                .get("default_from_email")
                .cloned()
                .unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
            default_from_name: props
                .get("default_from_name")
                .cloned()
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            request_timeout_ms,
        }))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_if_configured()?.ok_or_else(|| {
            ConfigError::Message("RESEND_API_KEY environment variable is required".to_string())
        })
    }

    /// `Ok(None)` when no API key is configured anywhere. A missing config
    /// file or a malformed value is still an error.
    pub fn from_env_if_configured() -> Result<Option<Self>, ConfigError> {
        Self::load(
            env::var("EMAIL_CONFIG_PATH").ok(),
            env::var("RESEND_API_KEY").ok(),
        )
    }

    fn load(
        config_path: Option<String>,
        api_key: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let mut builder = Config::builder()
            .set_default("resend_api_key", "")?
            .set_default("default_from_email", DEFAULT_FROM_EMAIL)?
            .set_default("default_from_name", DEFAULT_FROM_NAME)?
            .set_default("request_timeout_ms", DEFAULT_REQUEST_TIMEOUT_MS as i64)?;

        if let Some(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("EMAIL")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(api_key) = api_key {
            builder = builder.set_override("resend_api_key", api_key)?;
        }

        let email_config: EmailConfig = builder.build()?.try_deserialize()?;
        if email_config.resend_api_key.is_empty() {
            return Ok(None);
        }
        Ok(Some(email_config))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.resend_api_key.is_empty() {
            return Err("Resend API key is required".to_string());
        }

        if self.default_from_email.is_empty() {
            return Err("Default from email is required".to_string());
        }

        if !email_address::EmailAddress::is_valid(&self.default_from_email) {
            return Err(format!(
                "Invalid default from email: {}",
                self.default_from_email
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
