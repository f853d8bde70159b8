use crate::{AirQualityAlertError, RedisManager, Result};
use airquality_common::{Subscription, SUBSCRIPTIONS_HASH_KEY};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Durable mapping from owner to subscription.
///
/// `upsert` replaces any existing record for the same owner atomically, and
/// `list_all` returns every current record ordered by `owner_id`. A failed
/// enumeration is an error, never an empty list.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn upsert(&self, subscription: &Subscription) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<Subscription>>;
    /// Returns whether a record existed.
    async fn delete(&self, owner_id: u64) -> Result<bool>;
}

/// All subscriptions live in a single Redis hash keyed by owner id, so a
/// replace is one `HSET` on one field.
pub struct RedisSubscriptionStore {
    redis: Arc<RedisManager>,
    hash_key: String,
}

impl RedisSubscriptionStore {
    pub fn new(redis: Arc<RedisManager>) -> Self {
        Self {
            redis,
            hash_key: SUBSCRIPTIONS_HASH_KEY.to_string(),
        }
    }
}

/// Hash field and value for one subscription record.
pub fn encode_record(subscription: &Subscription) -> Result<(String, String)> {
    Ok((
        subscription.owner_id.to_string(),
        serde_json::to_string(subscription)?,
    ))
}

/// Decode a full hash read. Unreadable records are skipped with a warning
/// so one corrupt entry cannot stall the whole tick.
pub fn decode_records(raw: HashMap<String, String>) -> Vec<Subscription> {
    let mut subscriptions = Vec::with_capacity(raw.len());
    for (field, value) in raw {
        match serde_json::from_str::<Subscription>(&value) {
            Ok(sub) => subscriptions.push(sub),
            Err(e) => warn!("skipping unreadable subscription record {}: {}", field, e),
        }
    }
    subscriptions.sort_by_key(|s| s.owner_id);
    subscriptions
}

#[async_trait]
impl SubscriptionStore for RedisSubscriptionStore {
    async fn upsert(&self, subscription: &Subscription) -> Result<()> {
        let mut conn = self.redis.get_connection().await?;
        let (field, value) = encode_record(subscription)?;
        let _: () = conn
            .hset(&self.hash_key, field, value)
            .await
            .map_err(AirQualityAlertError::RedisConnection)?;
        debug!(owner_id = subscription.owner_id, "subscription stored");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        let mut conn = self.redis.get_connection().await?;
        let raw: HashMap<String, String> = conn
            .hgetall(&self.hash_key)
            .await
            .map_err(AirQualityAlertError::RedisConnection)?;

        Ok(decode_records(raw))
    }

    async fn delete(&self, owner_id: u64) -> Result<bool> {
        let mut conn = self.redis.get_connection().await?;
        let removed: i64 = conn
            .hdel(&self.hash_key, owner_id)
            .await
            .map_err(AirQualityAlertError::RedisConnection)?;
        Ok(removed > 0)
    }
}

/// Process-local store for tests and single-instance deployments.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<BTreeMap<u64, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn get(&self, owner_id: u64) -> Option<Subscription> {
        self.records.read().await.get(&owner_id).cloned()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn upsert(&self, subscription: &Subscription) -> Result<()> {
        self.records
            .write()
            .await
            .insert(subscription.owner_id, subscription.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, owner_id: u64) -> Result<bool> {
        Ok(self.records.write().await.remove(&owner_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn subscription(owner_id: u64, latitude: f64, longitude: f64) -> Subscription {
        Subscription {
            owner_id,
            latitude,
            longitude,
            threshold: Some(100),
            email: format!("owner{}@x.com", owner_id),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_second_upsert_replaces_first() {
        let store = InMemorySubscriptionStore::new();
        store.upsert(&subscription(1, 52.5, 13.4)).await.unwrap();
        store.upsert(&subscription(1, 48.8, 2.3)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].latitude, all[0].longitude), (48.8, 2.3));
    }

    #[tokio::test]
    async fn test_list_all_is_ordered_by_owner() {
        let store = InMemorySubscriptionStore::new();
        for owner in [30, 10, 20] {
            store.upsert(&subscription(owner, 1.0, 1.0)).await.unwrap();
        }

        let owners: Vec<u64> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|s| s.owner_id)
            .collect();
        assert_eq!(owners, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_for_same_owner_leave_one_record() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(&subscription(7, 10.0 + i as f64, 20.0))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 1);
        let stored = store.get(7).await.unwrap();
        assert!(stored.latitude >= 10.0 && stored.latitude < 26.0);
    }

    #[test]
    fn test_decode_skips_corrupt_records_and_orders_by_owner() {
        let mut raw = HashMap::new();
        for sub in [subscription(30, 1.0, 1.0), subscription(10, 2.0, 2.0)] {
            let (field, value) = encode_record(&sub).unwrap();
            raw.insert(field, value);
        }
        raw.insert("20".to_string(), "{truncated".to_string());

        let owners: Vec<u64> = decode_records(raw).iter().map(|s| s.owner_id).collect();
        assert_eq!(owners, vec![10, 30]);
    }

    #[test]
    fn test_encoded_record_reads_back() {
        let original = subscription(42, 52.52, 13.405);
        let (field, value) = encode_record(&original).unwrap();
        assert_eq!(field, "42");

        let decoded = decode_records(HashMap::from([(field, value)]));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].owner_id, 42);
        assert_eq!(decoded[0].email, original.email);
        assert_eq!(
            (decoded[0].latitude, decoded[0].longitude),
            (52.52, 13.405)
        );
    }

    #[test]
    fn test_same_owner_encodes_to_same_field() {
        // HSET semantics: a later write to the same field replaces the value.
        let mut hash = HashMap::new();
        for sub in [subscription(7, 52.5, 13.4), subscription(7, 48.8, 2.3)] {
            let (field, value) = encode_record(&sub).unwrap();
            hash.insert(field, value);
        }

        let decoded = decode_records(hash);
        assert_eq!(decoded.len(), 1);
        assert_eq!((decoded[0].latitude, decoded[0].longitude), (48.8, 2.3));
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = InMemorySubscriptionStore::new();
        store.upsert(&subscription(3, 1.0, 1.0)).await.unwrap();

        assert!(store.delete(3).await.unwrap());
        assert!(!store.delete(3).await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
