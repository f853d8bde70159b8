//! # Air-Quality Alert Scheduler wasmCloud Provider Binary
//!
//! Entry point for the air-quality alert scheduler capability provider.
//! Uses the wasmCloud provider runtime for lifecycle management.

use anyhow::{Context, Result};
use tracing::info;
use wasmcloud_provider_sdk::{load_host_data, run_provider};

use aqi_alert_scheduler_provider::AirQualityAlertProvider;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aqi_alert_scheduler_provider=info".parse()?)
                .add_directive("email_notification_provider=info".parse()?),
        )
        .init();

    info!("Starting Air-Quality Alert Scheduler Provider for wasmCloud");

    let host_data = load_host_data()
        .context("Failed to load wasmCloud host data")?
        .clone();

    info!("Provider ID: {}", host_data.provider_key);
    info!("Config entries: {}", host_data.config.len());

    let provider = AirQualityAlertProvider::from_host_data(&host_data)
        .await
        .context("Failed to create air-quality alert provider")?;

    info!("Provider ready - scheduler running");
    let handler = run_provider(provider.clone(), "aqi-alert-scheduler-provider")
        .await
        .context("Provider runtime error")?;
    handler.await;

    provider.stop().await;
    info!("Air-Quality Alert Scheduler Provider shutdown complete");
    Ok(())
}
