//! Refresh scheduling policies
//!
//! A [`RetryPolicy`] computes the delay until the next refresh attempt. The
//! orchestrator picks a policy from the outcome of every refresh cycle using
//! [`RetryPolicyFactory`] and keeps its current policy when the new one is
//! equal, so back-off progress survives repeated failures of the same kind.

use crate::config::RetryConfig;
use crate::error::{ElspotError, ErrorKind};
use crate::time::{is_at_or_after_local_time, to_std, until_next_local_time};
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use std::time::Duration;

/// HTTP status returned by the upstream API when the call quota is exhausted
const TOO_MANY_REQUESTS: u16 = 429;

/// Exponential back-off with an upper bound and proportional jitter
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub minimum: Duration,
    pub maximum: Duration,
    pub jitter_percent: u32,
    attempt: u32,
}

impl Backoff {
    pub const fn new(minimum: Duration, maximum: Duration, jitter_percent: u32) -> Self {
        Self {
            minimum,
            maximum,
            jitter_percent,
            attempt: 0,
        }
    }

    /// Constant delay without jitter
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 0)
    }

    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the current attempt, then advance the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt.min(16)).unwrap_or(u32::MAX);
        let base = self.minimum.saturating_mul(factor).min(self.maximum);
        self.attempt = self.attempt.saturating_add(1);
        jitter_wait(base, self.jitter_percent).min(self.maximum.max(self.minimum))
    }
}

impl PartialEq for Backoff {
    // Attempt bookkeeping is not part of a policy's identity
    fn eq(&self, other: &Self) -> bool {
        self.minimum == other.minimum
            && self.maximum == other.maximum
            && self.jitter_percent == other.jitter_percent
    }
}

impl Eq for Backoff {}

fn jitter_wait(base: Duration, jitter_percent: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, base_ms.saturating_mul(u64::from(jitter_percent)) / 100)
    };
    let mut rng = rand::rng();
    Duration::from_millis(base_ms.saturating_add(rng.random_range(0..jitter_range)))
}

/// Why the refresh cycle failed, as far as scheduling is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Configuration,
    RateLimited,
    Transient,
}

/// Strategy computing the delay until the next refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Short fixed delay before the first successful bootstrap
    Initial { delay: Duration },
    /// Lookahead is short of what the daily publication should provide.
    /// Waits for the publication time, then backs off until data appears.
    ExpectedDataMissing {
        anchor: NaiveTime,
        zone: Tz,
        backoff: Backoff,
    },
    /// Next occurrence of a local time of day
    FixedDailyAnchor { time: NaiveTime, zone: Tz },
    /// Delay driven by the classification of the last failure
    FromFailure { class: FailureClass, backoff: Backoff },
}

impl RetryPolicy {
    /// Delay until the next attempt. Never zero.
    pub fn next_delay(&mut self, now: DateTime<Utc>) -> Duration {
        let delay = match self {
            Self::Initial { delay } => *delay,
            Self::ExpectedDataMissing {
                anchor,
                zone,
                backoff,
            } => {
                if is_at_or_after_local_time(now, *anchor, *zone) {
                    backoff.next_delay()
                } else {
                    to_std(until_next_local_time(now, *anchor, *zone))
                }
            }
            Self::FixedDailyAnchor { time, zone } => to_std(until_next_local_time(now, *time, *zone)),
            Self::FromFailure { backoff, .. } => backoff.next_delay(),
        };
        delay.max(Duration::from_secs(1))
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initial { .. } => "initial",
            Self::ExpectedDataMissing { .. } => "expected-data-missing",
            Self::FixedDailyAnchor { .. } => "fixed-daily-anchor",
            Self::FromFailure { .. } => "from-failure",
        }
    }
}

/// Builds policies from the retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicyFactory {
    config: RetryConfig,
}

impl RetryPolicyFactory {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn initial(&self) -> RetryPolicy {
        RetryPolicy::Initial {
            delay: Duration::from_secs(self.config.initial_delay_secs),
        }
    }

    pub fn at_fixed_time(&self, time: NaiveTime, zone: Tz) -> RetryPolicy {
        RetryPolicy::FixedDailyAnchor { time, zone }
    }

    pub fn when_expected_data_missing(&self, anchor: NaiveTime, zone: Tz) -> RetryPolicy {
        RetryPolicy::ExpectedDataMissing {
            anchor,
            zone,
            backoff: Backoff::new(
                Duration::from_secs(self.config.data_missing_minimum_delay_secs),
                Duration::from_secs(self.config.failure_maximum_delay_secs),
                self.config.jitter_percent,
            ),
        }
    }

    /// Policy for a failed cycle
    pub fn from_error(&self, error: &ElspotError, anchor: NaiveTime, zone: Tz) -> RetryPolicy {
        match error.kind() {
            ErrorKind::Configuration => RetryPolicy::FromFailure {
                class: FailureClass::Configuration,
                backoff: Backoff::fixed(Duration::from_secs(
                    self.config.configuration_error_delay_secs,
                )),
            },
            ErrorKind::DataIncomplete => self.when_expected_data_missing(anchor, zone),
            _ if error.http_status_code() == Some(TOO_MANY_REQUESTS) => RetryPolicy::FromFailure {
                class: FailureClass::RateLimited,
                backoff: Backoff::new(
                    Duration::from_secs(self.config.rate_limited_minimum_delay_secs),
                    Duration::from_secs(
                        self.config
                            .failure_maximum_delay_secs
                            .max(self.config.rate_limited_minimum_delay_secs),
                    ),
                    self.config.jitter_percent,
                ),
            },
            _ => RetryPolicy::FromFailure {
                class: FailureClass::Transient,
                backoff: Backoff::new(
                    Duration::from_secs(self.config.failure_minimum_delay_secs),
                    Duration::from_secs(self.config.failure_maximum_delay_secs),
                    self.config.jitter_percent,
                ),
            },
        }
    }
}
