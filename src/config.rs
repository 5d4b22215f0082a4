//! Configuration management for Elspot
//!
//! This module handles loading, validation, and management of the service
//! configuration from YAML files.

use crate::cache::CacheSettings;
use crate::error::{ElspotError, Result};
use crate::prices::{Channel, Currency, PriceComponent};
use crate::source::{GlobalLocationNumber, TariffFilter};
use crate::time::{parse_time_of_day, parse_zone};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Price area, currency and charge owners
    pub service: ServiceConfig,

    /// Outputs currently consumed downstream
    pub subscriptions: Vec<Channel>,

    /// VAT handling for current-value reads
    pub vat: VatConfig,

    /// Refresh scheduling
    pub retry: RetryConfig,

    /// Cache retention
    pub cache: CacheConfig,

    /// Energi Data Service API access
    pub api: ApiConfig,

    /// Local time zone, used for the midnight tariff refresh and properties
    pub timezone: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bidding zone, e.g. DK1 or DK2
    pub price_area: String,

    /// Currency of spot prices
    pub currency: Currency,

    /// GLN of the grid company charging net tariffs
    pub grid_company_gln: String,

    /// GLN of Energinet, charging system and transmission tariffs and tax
    pub energinet_gln: String,

    /// Overrides of the grid company's default net tariff filter
    pub net_tariff_filter: Option<TariffFilter>,
}

/// VAT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VatConfig {
    /// ISO 3166 alpha-2 country code selecting the VAT rate
    pub country: String,

    /// Components whose current value is published including VAT
    pub include_vat: Vec<PriceComponent>,
}

/// Retry and refresh scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before retrying while nothing has been bootstrapped yet
    pub initial_delay_secs: u64,

    /// Local time (Nord Pool zone) when next-day spot prices are published
    pub daily_publication_time: String,

    /// Minimum number of cached spot hours expected after publication
    pub minimum_lookahead_hours: usize,

    /// Fixed cadence while the configuration is invalid
    pub configuration_error_delay_secs: u64,

    /// Back-off bounds for transient failures
    pub failure_minimum_delay_secs: u64,
    pub failure_maximum_delay_secs: u64,

    /// First back-off step when the API quota is exhausted
    pub rate_limited_minimum_delay_secs: u64,

    /// First back-off step while expected spot prices are missing
    pub data_missing_minimum_delay_secs: u64,

    /// Random extra delay in percent of the back-off step
    pub jitter_percent: u32,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Depth of the historic spot price window in hours
    pub historic_hours: u32,

    /// Keep the historic spot price window instead of evicting past hours
    pub keep_historic_spot: bool,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the dataset API
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            price_area: "DK1".to_string(),
            currency: Currency::DKK,
            grid_company_gln: String::new(),
            energinet_gln: crate::source::ENERGINET_GLN.to_string(),
            net_tariff_filter: None,
        }
    }
}

impl Default for VatConfig {
    fn default() -> Self {
        Self {
            country: "DK".to_string(),
            include_vat: Vec::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 15,
            daily_publication_time: "13:00".to_string(),
            minimum_lookahead_hours: 13,
            configuration_error_delay_secs: 3600,
            failure_minimum_delay_secs: 60,
            failure_maximum_delay_secs: 3600,
            rate_limited_minimum_delay_secs: 1800,
            data_missing_minimum_delay_secs: 600,
            jitter_percent: 20,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            historic_hours: 24,
            keep_historic_spot: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.energidataservice.dk/".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/elspot.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl RetryConfig {
    /// Parsed publication time of day
    pub fn publication_time(&self) -> Result<NaiveTime> {
        parse_time_of_day(&self.daily_publication_time)
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            historic_hours: config.historic_hours,
            keep_historic_spot: config.keep_historic_spot,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "elspot_config.yaml",
            "/data/elspot_config.yaml",
            "/etc/elspot/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Local time zone
    pub fn local_zone(&self) -> Result<Tz> {
        parse_zone(&self.timezone)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.price_area.trim().is_empty() {
            return Err(ElspotError::validation(
                "service.price_area",
                "Price area cannot be empty",
            ));
        }

        validate_gln("service.grid_company_gln", &self.service.grid_company_gln)?;
        validate_gln("service.energinet_gln", &self.service.energinet_gln)?;

        self.local_zone()?;
        self.retry.publication_time()?;

        let delays = [
            ("retry.initial_delay_secs", self.retry.initial_delay_secs),
            (
                "retry.configuration_error_delay_secs",
                self.retry.configuration_error_delay_secs,
            ),
            (
                "retry.failure_minimum_delay_secs",
                self.retry.failure_minimum_delay_secs,
            ),
            (
                "retry.failure_maximum_delay_secs",
                self.retry.failure_maximum_delay_secs,
            ),
            (
                "retry.rate_limited_minimum_delay_secs",
                self.retry.rate_limited_minimum_delay_secs,
            ),
            (
                "retry.data_missing_minimum_delay_secs",
                self.retry.data_missing_minimum_delay_secs,
            ),
            ("api.timeout_secs", self.api.timeout_secs),
        ];
        for (field, value) in delays {
            if value == 0 {
                return Err(ElspotError::validation(field, "Must be greater than 0"));
            }
        }

        if self.retry.failure_maximum_delay_secs < self.retry.failure_minimum_delay_secs {
            return Err(ElspotError::validation(
                "retry.failure_maximum_delay_secs",
                "Must not be below failure_minimum_delay_secs",
            ));
        }

        if self.retry.jitter_percent > 100 {
            return Err(ElspotError::validation(
                "retry.jitter_percent",
                "Must be between 0 and 100",
            ));
        }

        if self.api.endpoint.trim().is_empty() {
            return Err(ElspotError::validation(
                "api.endpoint",
                "Endpoint cannot be empty",
            ));
        }

        Ok(())
    }
}

fn validate_gln(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let gln = GlobalLocationNumber::new(value);
    if !gln.is_valid() {
        return Err(ElspotError::validation(
            field,
            format!("'{}' is not a valid Global Location Number", value),
        ));
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            subscriptions: Channel::ALL.to_vec(),
            vat: VatConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            api: ApiConfig::default(),
            timezone: "Europe/Copenhagen".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.price_area, "DK1");
        assert_eq!(config.service.energinet_gln, "5790000432752");
        assert_eq!(config.retry.minimum_lookahead_hours, 13);
        assert_eq!(config.subscriptions.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.service.price_area = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.service.grid_company_gln = "5790000610098".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("service.grid_company_gln"));

        config = Config::default();
        config.timezone = "Nowhere/Special".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.retry.jitter_percent = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.service.price_area, deserialized.service.price_area);
        assert_eq!(config.subscriptions, deserialized.subscriptions);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "service:\n  price_area: DK2\n  currency: EUR\nsubscriptions:\n  - electricity#current-spot-price\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.service.price_area, "DK2");
        assert_eq!(config.service.currency, Currency::EUR);
        assert_eq!(config.subscriptions, vec![Channel::CurrentSpotPrice]);
        assert_eq!(config.retry.initial_delay_secs, 15);
    }
}
