//! Redis connection pooling for the subscription store

use crate::{AirQualityAlertConfig, AirQualityAlertError, Result};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::info;

/// Redis connection manager with pooling
pub struct RedisManager {
    pool: Pool,
}

impl RedisManager {
    /// Create the pool and verify the server answers PING.
    pub async fn new(config: &AirQualityAlertConfig) -> Result<Self> {
        let mut redis_config = Config::from_url(&config.redis_url);
        redis_config.pool = Some(PoolConfig::new(config.redis_pool_size));
        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                AirQualityAlertError::Configuration(format!("Failed to create pool: {}", e))
            })?;

        let manager = Self { pool };
        let mut conn = manager.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(
            "Redis connection pool initialized with {} connections",
            config.redis_pool_size
        );

        Ok(manager)
    }

    /// Get connection from pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            AirQualityAlertError::StoreUnavailable(format!(
                "Failed to get connection from pool: {}",
                e
            ))
        })
    }

    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

/// Pool status information
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}
