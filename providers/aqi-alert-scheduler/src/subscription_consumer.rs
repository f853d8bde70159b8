use crate::{Result, SubscriptionService};
use airquality_common::{
    SubscribeRequestV1, UnsubscribeRequestV1, SUBSCRIPTION_DELETE_SUBJECT,
    SUBSCRIPTION_UPSERT_SUBJECT,
};
use async_nats::jetstream::{self, AckKind};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How a consumed message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    Ack,
    /// Redeliver after the given delay.
    Nak(Duration),
    /// Never redeliver: the payload itself is bad.
    Term,
}

impl MessageDisposition {
    pub fn for_result(result: &Result<()>, redelivery_delay: Duration) -> Self {
        match result {
            Ok(()) => MessageDisposition::Ack,
            Err(e) if e.is_retryable() => MessageDisposition::Nak(redelivery_delay),
            Err(_) => MessageDisposition::Term,
        }
    }
}

/// Applies subscribe and unsubscribe requests consumed from JetStream.
pub struct SubscriptionConsumer {
    service: Arc<SubscriptionService>,
    redelivery_delay: Duration,
}

impl SubscriptionConsumer {
    /// `redelivery_delay` spaces out retries while the store is unavailable.
    pub fn new(service: Arc<SubscriptionService>, redelivery_delay: Duration) -> Self {
        Self {
            service,
            redelivery_delay,
        }
    }

    pub async fn handle(&self, subject: &str, payload: &[u8]) -> Result<()> {
        match subject {
            SUBSCRIPTION_UPSERT_SUBJECT => {
                let request: SubscribeRequestV1 = serde_json::from_slice(payload)?;
                self.service.subscribe(request).await.map(|_| ())
            }
            SUBSCRIPTION_DELETE_SUBJECT => {
                let request: UnsubscribeRequestV1 = serde_json::from_slice(payload)?;
                self.service.unsubscribe(request).await.map(|_| ())
            }
            other => {
                debug!("ignoring message on unexpected subject {}", other);
                Ok(())
            }
        }
    }

    /// Consume until the message stream ends.
    pub async fn run(self, mut messages: jetstream::consumer::pull::Stream) {
        while let Some(msg_result) = messages.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to receive subscription message: {}", e);
                    continue;
                }
            };

            let subject = msg.subject.as_str().to_string();
            let result = self.handle(&subject, &msg.payload).await;
            if let Err(e) = &result {
                warn!("Failed to handle subscription message {}: {}", subject, e);
            }

            let ack = match MessageDisposition::for_result(&result, self.redelivery_delay) {
                MessageDisposition::Ack => msg.ack().await,
                MessageDisposition::Nak(delay) => msg.ack_with(AckKind::Nak(Some(delay))).await,
                MessageDisposition::Term => msg.ack_with(AckKind::Term).await,
            };
            if let Err(e) = ack {
                warn!("Failed to acknowledge subscription message: {}", e);
            }
        }
        warn!("subscription message stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AirQualityAlertError, InMemorySubscriptionStore, SubscriptionStore};
    use airquality_common::Subscription;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct UnavailableStore;

    #[async_trait]
    impl SubscriptionStore for UnavailableStore {
        async fn upsert(&self, _subscription: &Subscription) -> Result<()> {
            Err(AirQualityAlertError::StoreUnavailable("down".to_string()))
        }

        async fn list_all(&self) -> Result<Vec<Subscription>> {
            Err(AirQualityAlertError::StoreUnavailable("down".to_string()))
        }

        async fn delete(&self, _owner_id: u64) -> Result<bool> {
            Err(AirQualityAlertError::StoreUnavailable("down".to_string()))
        }
    }

    const REDELIVERY_DELAY: Duration = Duration::from_secs(60);

    fn consumer_with(store: Arc<dyn SubscriptionStore>) -> SubscriptionConsumer {
        SubscriptionConsumer::new(Arc::new(SubscriptionService::new(store)), REDELIVERY_DELAY)
    }

    fn disposition(result: &Result<()>) -> MessageDisposition {
        MessageDisposition::for_result(result, REDELIVERY_DELAY)
    }

    fn subscribe_payload(owner_id: u64, latitude: f64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "schema_version": "airquality_subscribe_v1",
            "request_id": "req-1",
            "owner_id": owner_id,
            "latitude": latitude,
            "longitude": 13.4,
            "threshold": 100,
            "email": "a@x.com",
            "requested_at": "2026-03-01T08:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_delete_are_applied() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let consumer = consumer_with(store.clone());

        let result = consumer
            .handle(SUBSCRIPTION_UPSERT_SUBJECT, &subscribe_payload(1, 52.5))
            .await;
        assert_eq!(disposition(&result), MessageDisposition::Ack);
        assert_eq!(store.get(1).await.unwrap().email, "a@x.com");

        let delete = serde_json::to_vec(&json!({
            "schema_version": "airquality_unsubscribe_v1",
            "request_id": "req-2",
            "owner_id": 1,
            "requested_at": "2026-03-01T09:00:00Z"
        }))
        .unwrap();
        consumer
            .handle(SUBSCRIPTION_DELETE_SUBJECT, &delete)
            .await
            .unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_bad_payloads_are_terminated() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let consumer = consumer_with(store.clone());

        let malformed = consumer
            .handle(SUBSCRIPTION_UPSERT_SUBJECT, b"{not json")
            .await;
        assert_eq!(disposition(&malformed), MessageDisposition::Term);

        let invalid = consumer
            .handle(SUBSCRIPTION_UPSERT_SUBJECT, &subscribe_payload(1, 0.0))
            .await;
        assert_eq!(disposition(&invalid), MessageDisposition::Term);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_outage_is_redelivered() {
        let consumer = consumer_with(Arc::new(UnavailableStore));
        let result = consumer
            .handle(SUBSCRIPTION_UPSERT_SUBJECT, &subscribe_payload(1, 52.5))
            .await;
        assert_eq!(disposition(&result), MessageDisposition::Nak(REDELIVERY_DELAY));
    }

    #[test]
    fn test_store_outage_nak_is_never_immediate() {
        let outage: Result<()> = Err(AirQualityAlertError::StoreUnavailable("down".to_string()));
        match MessageDisposition::for_result(&outage, Duration::from_secs(5)) {
            MessageDisposition::Nak(delay) => assert!(delay >= Duration::from_secs(5)),
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_subject_is_acked() {
        let consumer = consumer_with(Arc::new(InMemorySubscriptionStore::new()));
        let result = consumer.handle("airquality.subscriptions.other", b"{}").await;
        assert_eq!(disposition(&result), MessageDisposition::Ack);
    }
}
