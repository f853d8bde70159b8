pub mod client;
pub mod config;
pub mod dispatcher;
pub mod formatter;

pub use client::{ResendClient, ResendResponse, ResendResponseWrapper};
pub use config::EmailConfig;
pub use dispatcher::EmailAlertDispatcher;
pub use formatter::{EmailFormatter, EmailPayload};
