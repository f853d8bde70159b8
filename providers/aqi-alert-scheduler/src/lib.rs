//! Air-Quality Alert Scheduler Provider
//!
//! Periodically evaluates every subscription: fetch the latest measurements
//! for the subscriber's coordinates, ask the predictor for a risk estimate,
//! apply the configured risk policy and dispatch an alert when warranted.
//! Subscriptions arrive over NATS JetStream and are kept in Redis.

pub mod config;
pub mod error;
pub mod metrics_source;
pub mod nats_client;
pub mod policy;
pub mod predictor;
pub mod provider;
pub mod redis_ops;
pub mod scheduler;
pub mod subscription_consumer;
pub mod subscription_service;
pub mod subscription_store;

pub use config::{AirQualityAlertConfig, RiskPolicyKind, StoreBackend};
pub use error::AirQualityAlertError;
pub use metrics_source::{MetricsSource, OpenMeteoClient};
pub use nats_client::NatsClient;
pub use policy::{AlertDecision, NoAlertReason, RiskPolicy};
pub use predictor::{MlServiceClient, PassthroughPredictor, RiskPredictor};
pub use provider::AirQualityAlertProvider;
pub use redis_ops::RedisManager;
pub use scheduler::{
    AlertingScheduler, SchedulerHandle, SchedulerSettings, SchedulerState, SubscriberOutcome,
    TickReport,
};
pub use subscription_consumer::SubscriptionConsumer;
pub use subscription_service::SubscriptionService;
pub use subscription_store::{
    InMemorySubscriptionStore, RedisSubscriptionStore, SubscriptionStore,
};

// Re-export Result type for convenience
pub type Result<T> = std::result::Result<T, AirQualityAlertError>;
