use crate::{Result, SubscriptionStore};
use airquality_common::{
    SubscribeRequestV1, Subscription, UnsubscribeRequestV1, Validate,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Entry point for subscription changes. Requests are validated before the
/// store is touched.
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Create or replace the caller's subscription.
    pub async fn subscribe(&self, request: SubscribeRequestV1) -> Result<Subscription> {
        request.validate()?;

        let subscription = request.into_subscription(Utc::now());
        self.store.upsert(&subscription).await?;

        info!(
            owner_id = subscription.owner_id,
            has_destination = subscription.has_destination(),
            "subscription saved"
        );
        Ok(subscription)
    }

    /// Returns whether a subscription was removed.
    pub async fn unsubscribe(&self, request: UnsubscribeRequestV1) -> Result<bool> {
        request.validate()?;

        let removed = self.store.delete(request.owner_id).await?;
        info!(owner_id = request.owner_id, removed, "unsubscribe processed");
        Ok(removed)
    }
}
