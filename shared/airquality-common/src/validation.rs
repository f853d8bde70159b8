//! Validation for inbound subscription requests.
//!
//! Requests are rejected here, before anything touches the subscription
//! store.

use crate::{SubscribeRequestV1, UnsubscribeRequestV1};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing authenticated owner identity")]
    MissingOwner,

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid {field}: {value} ({reason})")]
    InvalidCoordinate {
        field: String,
        value: f64,
        reason: String,
    },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for SubscribeRequestV1 {
    fn validate(&self) -> ValidationResult<()> {
        if self.owner_id == 0 {
            return Err(ValidationError::MissingOwner);
        }

        validate_coordinate("latitude", self.latitude, 90.0)?;
        validate_coordinate("longitude", self.longitude, 180.0)?;

        let email = self.email.trim();
        if !email.is_empty() && !email_address::EmailAddress::is_valid(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }

        Ok(())
    }
}

impl Validate for UnsubscribeRequestV1 {
    fn validate(&self) -> ValidationResult<()> {
        if self.owner_id == 0 {
            return Err(ValidationError::MissingOwner);
        }
        Ok(())
    }
}

/// Zero is treated as "not supplied": the request format cannot tell the two
/// apart.
fn validate_coordinate(field: &str, value: f64, bound: f64) -> ValidationResult<()> {
    if value == 0.0 {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    if !value.is_finite() {
        return Err(ValidationError::InvalidCoordinate {
            field: field.to_string(),
            value,
            reason: "not a finite number".to_string(),
        });
    }
    if value.abs() > bound {
        return Err(ValidationError::InvalidCoordinate {
            field: field.to_string(),
            value,
            reason: format!("must be within ±{}", bound),
        });
    }
    Ok(())
}
