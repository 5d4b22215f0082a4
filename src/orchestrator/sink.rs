//! Publish side of the orchestrator and the consumed-output signal

use crate::error::{ElspotError, ErrorKind};
use crate::logging::{StructuredLogger, get_logger};
use crate::prices::Channel;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fmt;

pub const PROPERTY_REMAINING_CALLS: &str = "remainingCalls";
pub const PROPERTY_TOTAL_CALLS: &str = "totalCalls";
pub const PROPERTY_LAST_CALL: &str = "lastCall";
pub const PROPERTY_NEXT_CALL: &str = "nextCall";

/// Reason attached to an offline status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineDetail {
    ConfigurationError,
    CommunicationError,
}

/// Service status as seen by consumers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Online,
    Offline {
        detail: OfflineDetail,
        message: String,
    },
}

impl ServiceStatus {
    /// Offline status describing a failed refresh cycle
    pub fn from_error(error: &ElspotError) -> Self {
        let detail = match error.kind() {
            ErrorKind::Configuration => OfflineDetail::ConfigurationError,
            _ => OfflineDetail::CommunicationError,
        };
        Self::Offline {
            detail,
            message: error.to_string(),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Online => f.write_str("ONLINE"),
            Self::Offline { detail, message } => write!(f, "OFFLINE ({:?}): {}", detail, message),
        }
    }
}

/// Receiver of everything the orchestrator publishes
pub trait PriceSink: Send + Sync {
    /// Value of a current-hour channel; `None` publishes "undefined"
    fn publish_current(&self, channel: Channel, value: Option<Decimal>);

    /// JSON array of the future price curve
    fn publish_future_prices(&self, json: &str);

    fn publish_status(&self, status: &ServiceStatus);

    fn publish_property(&self, key: &str, value: &str);
}

/// Sink writing every publication to the log
#[derive(Debug, Clone)]
pub struct LoggingSink {
    logger: StructuredLogger,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self {
            logger: get_logger("sink"),
        }
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSink for LoggingSink {
    fn publish_current(&self, channel: Channel, value: Option<Decimal>) {
        match value {
            Some(v) => self.logger.info(&format!("{} = {}", channel, v)),
            None => self.logger.info(&format!("{} = UNDEF", channel)),
        }
    }

    fn publish_future_prices(&self, json: &str) {
        self.logger.debug(&format!("{} = {}", Channel::HourlyPrices, json));
    }

    fn publish_status(&self, status: &ServiceStatus) {
        match status {
            ServiceStatus::Offline { .. } => self.logger.warn(&format!("Status {}", status)),
            _ => self.logger.info(&format!("Status {}", status)),
        }
    }

    fn publish_property(&self, key: &str, value: &str) {
        self.logger.debug(&format!("Property {} = {}", key, value));
    }
}

/// Whether a published output is currently consumed downstream
pub trait Subscriptions: Send + Sync {
    fn is_subscribed(&self, channel: Channel) -> bool;
}

/// Fixed set of consumed channels, typically from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSubscriptions {
    channels: BTreeSet<Channel>,
}

impl StaticSubscriptions {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
        }
    }

    pub fn all() -> Self {
        Self::new(Channel::ALL)
    }
}

impl Subscriptions for StaticSubscriptions {
    fn is_subscribed(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }
}
