//! Refresh orchestration
//!
//! The [`RefreshOrchestrator`] owns the retry state and drives two timers on
//! a single task: the refresh cycle, rescheduled by the active
//! [`RetryPolicy`] after every cycle, and an hourly tick that republishes
//! current values from the cache without fetching. Only one cycle is ever in
//! flight, and shutdown interrupts it at its next await point.

pub mod service;
pub mod sink;

pub use service::PriceService;
pub use sink::{
    LoggingSink, OfflineDetail, PROPERTY_LAST_CALL, PROPERTY_NEXT_CALL, PROPERTY_REMAINING_CALLS,
    PROPERTY_TOTAL_CALLS, PriceSink, ServiceStatus, StaticSubscriptions, Subscriptions,
};

use crate::error::{ElspotError, ErrorKind, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::prices::{Channel, PriceComponent};
use crate::retry::{RetryPolicy, RetryPolicyFactory};
use crate::time::{DATAHUB_ZONE, NORD_POOL_ZONE, PROPERTY_DATETIME_FORMAT, next_hour_boundary, to_std};
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use uuid::Uuid;

/// Offset past the hour boundary at which the hourly tick fires
const TICK_EPSILON: Duration = Duration::from_millis(1);

/// Result of one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub cycle_id: String,
    pub status: ServiceStatus,
    /// Name of the policy that scheduled the next cycle
    pub policy: &'static str,
    pub delay: Duration,
    pub next_call: DateTime<Utc>,
}

/// Coordinates fetching, caching, publishing and rescheduling
pub struct RefreshOrchestrator {
    service: Arc<PriceService>,
    sink: Arc<dyn PriceSink>,
    subscriptions: Arc<dyn Subscriptions>,
    factory: RetryPolicyFactory,
    policy: RetryPolicy,
    bootstrapped: bool,
    logger: StructuredLogger,
}

impl RefreshOrchestrator {
    pub fn new(
        service: Arc<PriceService>,
        sink: Arc<dyn PriceSink>,
        subscriptions: Arc<dyn Subscriptions>,
    ) -> Self {
        let factory = RetryPolicyFactory::new(service.config().retry.clone());
        let policy = factory.initial();
        let logger = get_logger_with_context(
            LogContext::new("orchestrator")
                .with_price_area(&service.config().service.price_area)
                .with_field("currency", service.currency().to_string()),
        );
        Self {
            service,
            sink,
            subscriptions,
            factory,
            policy,
            bootstrapped: false,
            logger,
        }
    }

    pub fn service(&self) -> &Arc<PriceService> {
        &self.service
    }

    /// Policy currently scheduling refresh cycles
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// A component is needed when its own channel or the future curve is consumed
    pub fn is_needed(&self, component: PriceComponent) -> bool {
        self.subscriptions.is_subscribed(component.current_channel())
            || self.subscriptions.is_subscribed(Channel::HourlyPrices)
    }

    fn local_zone(&self) -> Tz {
        self.service.config().local_zone().unwrap_or(DATAHUB_ZONE)
    }

    fn publication_time(&self) -> NaiveTime {
        // Only reached with an invalid time, which also fails validation
        self.service
            .config()
            .retry
            .publication_time()
            .unwrap_or(NaiveTime::MIN)
    }

    /// Run one refresh cycle: fetch what is needed, clean up, publish and
    /// select the policy scheduling the next cycle
    pub async fn refresh_cycle(&mut self) -> CycleOutcome {
        let cycle_id = Uuid::new_v4().to_string();
        let logger = self.logger.for_cycle(&cycle_id);
        logger.debug("Refresh cycle started");

        let result = self.download_needed(&logger).await;

        self.service.cache().cleanup();
        let status = match &result {
            Ok(()) => ServiceStatus::Online,
            Err(e) => {
                logger.warn(&format!("Refresh failed: {}", e));
                ServiceStatus::from_error(e)
            }
        };
        self.sink.publish_status(&status);
        self.publish_prices();

        let candidate = self.select_policy(&result);
        // Equal policies keep their back-off progress
        if candidate != self.policy {
            self.policy = candidate;
        }
        if result.is_ok() {
            self.bootstrapped = true;
        }

        let now = self.service.now();
        let delay = self.policy.next_delay(now);
        let next_call = now
            + TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::seconds(1));
        self.publish_properties(next_call);

        logger.debug(&format!(
            "Refresh job rescheduled in {} seconds ({}): {}",
            delay.as_secs(),
            self.policy.name(),
            next_call
        ));

        CycleOutcome {
            cycle_id,
            status,
            policy: self.policy.name(),
            delay,
            next_call,
        }
    }

    fn any_needed(&self) -> bool {
        PriceComponent::ALL.into_iter().any(|c| self.is_needed(c))
    }

    async fn download_needed(&self, logger: &StructuredLogger) -> Result<()> {
        self.service.config().validate()?;

        let mut errors: Vec<ElspotError> = Vec::new();
        for component in PriceComponent::ALL {
            if !self.is_needed(component) {
                continue;
            }
            let logger = logger.with_field("price_component", component);
            if !self.service.needs_download(component) {
                logger.debug("Cached series still valid, skipping download");
                continue;
            }
            match self.service.download(component).await {
                Ok(count) => logger.debug(&format!("Downloaded {} records", count)),
                Err(e) => {
                    logger.warn(&format!("Download of {} failed: {}", component, e));
                    errors.push(e);
                }
            }
        }

        // Configuration problems outrank transient ones
        let position = errors
            .iter()
            .position(|e| e.kind() == ErrorKind::Configuration)
            .unwrap_or(0);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.swap_remove(position))
        }
    }

    fn select_policy(&self, result: &Result<()>) -> RetryPolicy {
        let anchor = self.publication_time();
        if let Err(e) = result {
            return self.factory.from_error(e, anchor, NORD_POOL_ZONE);
        }

        if self.is_needed(PriceComponent::SpotPrice) {
            let expected = self.service.config().retry.minimum_lookahead_hours;
            let actual = self.service.cache().lookahead_hours(PriceComponent::SpotPrice);
            if actual < expected {
                let missing = ElspotError::DataIncomplete { expected, actual };
                self.logger.debug(&missing.to_string());
                return self.factory.from_error(&missing, anchor, NORD_POOL_ZONE);
            }
            return self.factory.at_fixed_time(anchor, NORD_POOL_ZONE);
        }

        if !self.bootstrapped && !self.any_needed() {
            return self.factory.initial();
        }

        // Tariffs only, or nothing consumed since the first cycle: refresh
        // after local midnight
        self.factory.at_fixed_time(NaiveTime::MIN, self.local_zone())
    }

    /// Republish current values and the future curve for consumed channels
    pub fn publish_prices(&self) {
        for component in PriceComponent::ALL {
            let channel = component.current_channel();
            if self.subscriptions.is_subscribed(channel) {
                self.sink
                    .publish_current(channel, self.service.current_value(component));
            }
        }

        if self.subscriptions.is_subscribed(Channel::HourlyPrices) {
            match self.service.future_prices_json() {
                Ok(json) => self.sink.publish_future_prices(&json),
                Err(e) => self
                    .logger
                    .error(&format!("Failed to serialize future prices: {}", e)),
            }
        }
    }

    fn format_local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.local_zone())
            .format(PROPERTY_DATETIME_FORMAT)
            .to_string()
    }

    fn publish_properties(&self, next_call: DateTime<Utc>) {
        if let Some(usage) = self.service.source().api_usage() {
            if let Some(remaining) = usage.remaining_calls {
                self.sink
                    .publish_property(PROPERTY_REMAINING_CALLS, &remaining.to_string());
            }
            if let Some(total) = usage.total_calls {
                self.sink
                    .publish_property(PROPERTY_TOTAL_CALLS, &total.to_string());
            }
            if let Some(last_call) = usage.last_call {
                self.sink
                    .publish_property(PROPERTY_LAST_CALL, &self.format_local(last_call));
            }
        }
        self.sink
            .publish_property(PROPERTY_NEXT_CALL, &self.format_local(next_call));
    }

    /// Hourly republish: evict past hours and publish current values
    pub fn hourly_tick(&self) {
        self.service.cache().cleanup();
        self.publish_prices();
    }

    fn until_next_tick(&self) -> Duration {
        let now = self.service.now();
        to_std(next_hour_boundary(now) - now) + TICK_EPSILON
    }

    /// Start the refresh loop on a new task. The first cycle runs immediately.
    pub fn spawn(self) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        OrchestratorHandle {
            shutdown_tx,
            join: Some(join),
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.logger.info("Refresh orchestrator started");
        let mut refresh_at = Instant::now();
        let mut tick_at = Instant::now() + self.until_next_tick();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
                () = sleep_until(refresh_at) => {
                    let outcome = tokio::select! {
                        outcome = self.refresh_cycle() => outcome,
                        _ = shutdown.changed() => {
                            self.logger.debug("Refresh cycle interrupted by shutdown");
                            break;
                        }
                    };
                    refresh_at = Instant::now() + outcome.delay;
                }
                () = sleep_until(tick_at) => {
                    self.hourly_tick();
                    tick_at = Instant::now() + self.until_next_tick();
                }
            }
        }

        self.service.cache().clear();
        self.logger.info("Refresh orchestrator stopped");
    }
}

/// Owner of a running orchestrator task. Dropping it cancels the task.
#[derive(Debug)]
pub struct OrchestratorHandle {
    shutdown_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Signal shutdown and wait for the task to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                crate::logging::get_logger("orchestrator")
                    .error(&format!("Orchestrator task failed: {}", e));
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for OrchestratorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
