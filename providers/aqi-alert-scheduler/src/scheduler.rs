//! Periodic alert evaluation loop
//!
//! Every tick enumerates all subscriptions and runs each one through
//! fetch -> predict -> evaluate -> dispatch. Subscribers are isolated from
//! each other: an error or panic while handling one is logged and the tick
//! moves on. A failed enumeration waits the store backoff and retries without
//! ending the loop.

use crate::policy::{AlertDecision, NoAlertReason, RiskPolicy};
use crate::{AirQualityAlertConfig, MetricsSource, RiskPredictor, SubscriptionStore};
use airquality_common::{AlertDispatcher, AlertNotice, Subscription};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub store_retry_backoff: Duration,
    /// 1 evaluates subscribers one after another.
    pub max_concurrent_evaluations: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &AirQualityAlertConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            store_retry_backoff: config.store_retry_backoff(),
            max_concurrent_evaluations: config.max_concurrent_evaluations.max(1),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&AirQualityAlertConfig::default())
    }
}

/// What happened to one subscriber during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberOutcome {
    Alerted,
    NotAlerted(NoAlertReason),
    /// The policy asked for an alert but the subscriber has no destination.
    DispatchSkipped,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub evaluated: usize,
    pub alerted: usize,
    pub not_alerted: usize,
    pub dispatch_skipped: usize,
    pub failed: usize,
    /// Per-subscriber outcomes in store enumeration order.
    pub outcomes: Vec<(u64, SubscriberOutcome)>,
}

impl TickReport {
    fn record(&mut self, owner_id: u64, outcome: SubscriberOutcome) {
        self.evaluated += 1;
        match outcome {
            SubscriberOutcome::Alerted => self.alerted += 1,
            SubscriberOutcome::NotAlerted(_) => self.not_alerted += 1,
            SubscriberOutcome::DispatchSkipped => self.dispatch_skipped += 1,
            SubscriberOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push((owner_id, outcome));
    }
}

/// Collaborators for the per-subscriber stages. Shared with spawned
/// evaluation tasks.
struct SubscriberPipeline {
    metrics: Arc<dyn MetricsSource>,
    predictor: Arc<dyn RiskPredictor>,
    dispatcher: Arc<dyn AlertDispatcher>,
    policy: RiskPolicy,
}

impl SubscriberPipeline {
    async fn evaluate(&self, subscription: Subscription) -> SubscriberOutcome {
        let owner_id = subscription.owner_id;

        let snapshot = match self
            .metrics
            .fetch(subscription.latitude, subscription.longitude)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(owner_id, "metrics fetch failed, skipping subscriber: {}", e);
                return SubscriberOutcome::Failed(e.to_string());
            }
        };

        let prediction = match self.predictor.predict(&subscription, &snapshot).await {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(owner_id, "prediction failed, skipping subscriber: {}", e);
                return SubscriberOutcome::Failed(e.to_string());
            }
        };

        let signal = match self.policy.evaluate(&prediction, &snapshot, &subscription) {
            AlertDecision::Alert(signal) => signal,
            AlertDecision::NoAlert(reason) => {
                match &reason {
                    NoAlertReason::UnrecognizedRisk(_) => info!(owner_id, "no alert: {}", reason),
                    _ => debug!(owner_id, "no alert: {}", reason),
                }
                return SubscriberOutcome::NotAlerted(reason);
            }
        };

        if !subscription.has_destination() {
            info!(
                owner_id,
                risk = %signal.headline(),
                "alert warranted but subscriber has no destination"
            );
            return SubscriberOutcome::DispatchSkipped;
        }

        let notice = AlertNotice::new(
            owner_id,
            subscription.latitude,
            subscription.longitude,
            signal,
            Utc::now(),
        );
        match self
            .dispatcher
            .send_alert(subscription.email.trim(), &notice)
            .await
        {
            Ok(receipt) => {
                info!(
                    owner_id,
                    alert_id = %notice.alert_id,
                    channel = self.dispatcher.channel(),
                    message_id = ?receipt.message_id,
                    "alert dispatched"
                );
                SubscriberOutcome::Alerted
            }
            Err(e) => {
                warn!(
                    owner_id,
                    alert_id = %notice.alert_id,
                    retryable = e.is_retryable(),
                    "alert dispatch failed: {}",
                    e
                );
                SubscriberOutcome::Failed(e.to_string())
            }
        }
    }
}

pub struct AlertingScheduler {
    store: Arc<dyn SubscriptionStore>,
    pipeline: Arc<SubscriberPipeline>,
    settings: SchedulerSettings,
}

impl AlertingScheduler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        metrics: Arc<dyn MetricsSource>,
        predictor: Arc<dyn RiskPredictor>,
        dispatcher: Arc<dyn AlertDispatcher>,
        policy: RiskPolicy,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            pipeline: Arc::new(SubscriberPipeline {
                metrics,
                predictor,
                dispatcher,
                policy,
            }),
            settings,
        }
    }

    /// Start the loop on a background task and return immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);

        let task = tokio::spawn(async move {
            self.run_loop(shutdown_rx).await;
            let _ = state_tx.send(SchedulerState::Stopped);
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        }
    }

    /// Runs ticks until `shutdown` turns true. Dropping the sender does not
    /// stop the loop.
    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            policy = ?self.pipeline.policy,
            "alerting scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let subscriptions = match self.store.list_all().await {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    warn!(
                        backoff_secs = self.settings.store_retry_backoff.as_secs(),
                        "failed to enumerate subscriptions, retrying after backoff: {}",
                        e
                    );
                    if pause(self.settings.store_retry_backoff, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let report = self.run_tick(subscriptions).await;
            info!(
                evaluated = report.evaluated,
                alerted = report.alerted,
                not_alerted = report.not_alerted,
                dispatch_skipped = report.dispatch_skipped,
                failed = report.failed,
                "tick complete"
            );

            if pause(self.settings.interval, &mut shutdown).await {
                break;
            }
        }

        info!("alerting scheduler stopped");
    }

    /// Evaluate one batch of subscriptions. Outcomes keep the input order
    /// regardless of the configured concurrency.
    pub async fn run_tick(&self, subscriptions: Vec<Subscription>) -> TickReport {
        let concurrency = self.settings.max_concurrent_evaluations.max(1);

        let outcomes: Vec<(u64, SubscriberOutcome)> = stream::iter(subscriptions)
            .map(|subscription| {
                let pipeline = self.pipeline.clone();
                let owner_id = subscription.owner_id;
                async move {
                    let outcome =
                        match tokio::spawn(async move { pipeline.evaluate(subscription).await })
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                warn!(owner_id, "subscriber evaluation aborted: {}", e);
                                SubscriberOutcome::Failed(format!("evaluation aborted: {}", e))
                            }
                        };
                    (owner_id, outcome)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = TickReport::default();
        for (owner_id, outcome) in outcomes {
            report.record(owner_id, outcome);
        }
        report
    }
}

/// Sleep for `duration` unless a stop is requested first. Returns true when
/// the loop should stop.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        stopped = wait_for_stop(shutdown) => stopped,
    }
}

async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if shutdown.changed().await.is_err() {
            return std::future::pending().await;
        }
        if *shutdown.borrow() {
            return true;
        }
    }
}

/// Handle to a spawned scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        if self.task.is_finished() {
            return SchedulerState::Stopped;
        }
        *self.state.borrow()
    }

    /// Signal the loop and wait for it to finish the step it is on.
    pub async fn stop(self) -> SchedulerState {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("scheduler task ended abnormally: {}", e);
        }
        SchedulerState::Stopped
    }
}
