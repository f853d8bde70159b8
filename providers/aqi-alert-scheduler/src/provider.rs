use crate::{
    AirQualityAlertConfig, AirQualityAlertError, AlertingScheduler, InMemorySubscriptionStore,
    MetricsSource, MlServiceClient, NatsClient, OpenMeteoClient, PassthroughPredictor,
    RedisManager, RedisSubscriptionStore, Result, RiskPolicy, RiskPolicyKind, RiskPredictor,
    SchedulerHandle, SchedulerSettings, StoreBackend, SubscriptionConsumer, SubscriptionService,
    SubscriptionStore,
};
use airquality_common::{AlertDispatcher, LoggingDispatcher};
use email_notification_provider::{EmailAlertDispatcher, EmailConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wasmcloud_provider_sdk::Provider;

/// Air-quality alert scheduler (wasmCloud capability provider)
#[derive(Clone)]
pub struct AirQualityAlertProvider {
    subscriptions: Arc<SubscriptionService>,
    scheduler: Arc<Mutex<Option<SchedulerHandle>>>,
    consumer_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AirQualityAlertProvider {
    pub async fn from_host_data(host_data: &wasmcloud_provider_sdk::HostData) -> Result<Self> {
        let config = if !host_data.config.is_empty() {
            AirQualityAlertConfig::from_properties(&host_data.config)
                .map_err(|e| AirQualityAlertError::Configuration(format!("Config error: {}", e)))?
        } else {
            AirQualityAlertConfig::from_env().map_err(|e| {
                AirQualityAlertError::Configuration(format!("Config error: {}", e))
            })?
        };

        let email_config = email_config_from(&host_data.config)?;

        Self::new(config, email_config).await
    }

    /// Wire the store and collaborators, then start the scheduler and the
    /// subscription consumer.
    pub async fn new(
        config: AirQualityAlertConfig,
        email_config: Option<EmailConfig>,
    ) -> Result<Self> {
        info!("Initializing Air-Quality Alert Scheduler Provider");
        config.validate().map_err(AirQualityAlertError::Configuration)?;

        let store: Arc<dyn SubscriptionStore> = match config.store_backend {
            StoreBackend::Redis => {
                let redis = Arc::new(RedisManager::new(&config).await?);
                let status = redis.pool_status();
                info!(
                    size = status.size,
                    available = status.available,
                    "Using Redis subscription store"
                );
                Arc::new(RedisSubscriptionStore::new(redis))
            }
            StoreBackend::Memory => {
                warn!("Using in-memory subscription store; subscriptions are lost on restart");
                Arc::new(InMemorySubscriptionStore::new())
            }
        };

        let subscriptions = Arc::new(SubscriptionService::new(store.clone()));
        let consumer_task = Self::start_subscription_consumer(&config, subscriptions.clone()).await?;
        let scheduler = Self::build_scheduler(&config, email_config, store)?.spawn();

        Ok(Self {
            subscriptions,
            scheduler: Arc::new(Mutex::new(Some(scheduler))),
            consumer_task: Arc::new(Mutex::new(Some(consumer_task))),
        })
    }

    fn build_scheduler(
        config: &AirQualityAlertConfig,
        email_config: Option<EmailConfig>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Result<AlertingScheduler> {
        let metrics: Arc<dyn MetricsSource> = Arc::new(OpenMeteoClient::from_config(config)?);

        let predictor: Arc<dyn RiskPredictor> = match config.ml_service_url() {
            Some(url) => {
                let client = MlServiceClient::new(
                    url,
                    &config.ml_predict_path,
                    Duration::from_millis(config.ml_timeout_ms),
                )?;
                info!("Using ML prediction service at {}", client.predict_url());
                Arc::new(client)
            }
            None => {
                if config.risk_policy == RiskPolicyKind::Categorical {
                    warn!(
                        "No ML service configured with the categorical policy; no alerts will be raised"
                    );
                } else {
                    info!("No ML service configured; using measured index pass-through");
                }
                Arc::new(PassthroughPredictor)
            }
        };

        let dispatcher: Arc<dyn AlertDispatcher> = match email_config {
            Some(email_config) => Arc::new(EmailAlertDispatcher::new(&email_config)?),
            None => {
                warn!("Email delivery not configured; alerts will only be logged");
                Arc::new(LoggingDispatcher)
            }
        };

        Ok(AlertingScheduler::new(
            store,
            metrics,
            predictor,
            dispatcher,
            RiskPolicy::from_config(config),
            SchedulerSettings::from_config(config),
        ))
    }

    async fn start_subscription_consumer(
        config: &AirQualityAlertConfig,
        subscriptions: Arc<SubscriptionService>,
    ) -> Result<JoinHandle<()>> {
        let nats = NatsClient::new(&config.nats_url, config.subscription_stream_name.clone()).await?;
        let messages = nats.subscribe_to_subscription_requests().await?;
        let consumer = SubscriptionConsumer::new(subscriptions, config.store_retry_backoff());
        Ok(tokio::spawn(consumer.run(messages)))
    }

    pub fn subscriptions(&self) -> Arc<SubscriptionService> {
        self.subscriptions.clone()
    }

    /// Stop the consumer and the scheduler. Safe to call more than once.
    pub async fn stop(&self) {
        if let Some(task) = self.consumer_task.lock().await.take() {
            task.abort();
        }
        if let Some(handle) = self.scheduler.lock().await.take() {
            let state = handle.stop().await;
            info!(?state, "Alert scheduler stopped");
        }
    }
}

/// `None` only when no Resend API key is configured. A malformed email
/// configuration fails startup instead of silently disabling delivery.
fn email_config_from(props: &HashMap<String, String>) -> Result<Option<EmailConfig>> {
    let loaded = if props.is_empty() {
        EmailConfig::from_env_if_configured()
    } else {
        EmailConfig::from_properties_if_configured(props)
    };
    loaded.map_err(|e| AirQualityAlertError::Configuration(format!("Email config error: {}", e)))
}

impl Provider for AirQualityAlertProvider {
    fn shutdown(&self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send {
        async move {
            info!("Shutting down Air-Quality Alert Scheduler Provider");
            self.stop().await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmcloud_provider_sdk::Provider;

    #[test]
    fn test_provider_traits() {
        fn assert_provider<T: Provider>() {}
        assert_provider::<AirQualityAlertProvider>();
    }

    #[test]
    fn test_scheduler_builds_without_ml_or_email() {
        let config = AirQualityAlertConfig {
            store_backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store: Arc<dyn SubscriptionStore> = Arc::new(InMemorySubscriptionStore::new());
        assert!(AirQualityAlertProvider::build_scheduler(&config, None, store).is_ok());
    }

    #[test]
    fn test_malformed_email_properties_fail_startup() {
        let mut props = HashMap::new();
        props.insert("resend_api_key".to_string(), "re_live".to_string());
        props.insert("email_timeout_ms".to_string(), "soon".to_string());
        assert!(matches!(
            email_config_from(&props),
            Err(AirQualityAlertError::Configuration(_))
        ));
    }

    #[test]
    fn test_email_disabled_without_api_key() {
        let mut props = HashMap::new();
        props.insert("redis_url".to_string(), "redis://127.0.0.1:6379".to_string());
        assert!(email_config_from(&props).unwrap().is_none());

        props.insert("resend_api_key".to_string(), "re_live".to_string());
        let email_config = email_config_from(&props).unwrap().unwrap();
        assert_eq!(email_config.resend_api_key, "re_live");
    }

    #[test]
    fn test_scheduler_rejects_invalid_email_config() {
        let store: Arc<dyn SubscriptionStore> = Arc::new(InMemorySubscriptionStore::new());
        let result = AirQualityAlertProvider::build_scheduler(
            &AirQualityAlertConfig::default(),
            Some(EmailConfig::default()),
            store,
        );
        assert!(matches!(result, Err(AirQualityAlertError::Dispatch(_))));
    }
}
