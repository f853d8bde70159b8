use crate::{AirQualityAlertError, Result};
use airquality_common::SUBSCRIPTION_SUBJECTS;
use async_nats::jetstream;
use std::time::Duration;
use tracing::info;

const CONSUMER_NAME: &str = "aqi-alert-scheduler-provider";

/// Work-queue stream holding subscribe and unsubscribe requests.
pub fn subscription_stream_config(stream_name: &str) -> jetstream::stream::Config {
    jetstream::stream::Config {
        name: stream_name.to_string(),
        description: Some("Air-quality subscription requests".to_string()),
        subjects: vec![SUBSCRIPTION_SUBJECTS.to_string()],
        retention: jetstream::stream::RetentionPolicy::WorkQueue,
        storage: jetstream::stream::StorageType::File,
        max_messages: 500_000,
        max_age: Duration::from_secs(7 * 86400),
        max_message_size: 65_536,
        duplicate_window: Duration::from_secs(300),
        ..Default::default()
    }
}

/// Durable pull consumer. Redelivery is unbounded: bad payloads are
/// terminated, so only store outages come back, and those must not be
/// dropped after a fixed number of attempts.
pub fn subscription_consumer_config() -> jetstream::consumer::pull::Config {
    jetstream::consumer::pull::Config {
        durable_name: Some(CONSUMER_NAME.to_string()),
        description: Some("Air-quality alert scheduler subscription consumer".to_string()),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        ack_wait: Duration::from_secs(30),
        max_deliver: -1,
        filter_subject: SUBSCRIPTION_SUBJECTS.to_string(),
        replay_policy: jetstream::consumer::ReplayPolicy::Instant,
        ..Default::default()
    }
}

/// NATS JetStream client for inbound subscription requests.
#[derive(Clone)]
pub struct NatsClient {
    jetstream: jetstream::Context,
    stream_name: String,
}

impl NatsClient {
    pub async fn new(nats_url: &str, stream_name: String) -> Result<Self> {
        info!("Connecting to NATS at {}", nats_url);

        let client = async_nats::connect(nats_url).await.map_err(|e| {
            AirQualityAlertError::NatsConnection(format!("Failed to connect to NATS: {}", e))
        })?;

        Ok(Self {
            jetstream: jetstream::new(client),
            stream_name,
        })
    }

    pub async fn subscribe_to_subscription_requests(
        &self,
    ) -> Result<jetstream::consumer::pull::Stream> {
        info!(
            "Setting up consumer {} on stream {}",
            CONSUMER_NAME, self.stream_name
        );

        let stream = self
            .jetstream
            .get_or_create_stream(subscription_stream_config(&self.stream_name))
            .await
            .map_err(|e| {
                AirQualityAlertError::NatsConnection(format!(
                    "Failed to get or create stream {}: {}",
                    self.stream_name, e
                ))
            })?;

        let consumer = stream
            .get_or_create_consumer(CONSUMER_NAME, subscription_consumer_config())
            .await
            .map_err(|e| {
                AirQualityAlertError::NatsConnection(format!(
                    "Failed to get or create consumer {}: {}",
                    CONSUMER_NAME, e
                ))
            })?;

        consumer.messages().await.map_err(|e| {
            AirQualityAlertError::NatsConnection(format!(
                "Failed to create message stream: {}",
                e
            ))
        })
    }
}
