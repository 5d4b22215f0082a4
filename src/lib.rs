//! # Elspot - hourly electricity prices from Energi Data Service
//!
//! Fetches Nord Pool spot prices and Datahub tariffs for a Danish price
//! area, keeps them in an hourly cache, and republishes current values and
//! the future price curve on a schedule that follows the day-ahead
//! publication rhythm.
//!
//! ## Architecture
//!
//! - `source`: Energi Data Service datasets, query parameters and filters
//! - `normalizer`: expansion of tariff price lists into hourly series
//! - `cache`: per-component hourly time series with retention
//! - `retry`: refresh scheduling and back-off policies
//! - `orchestrator`: refresh cycle, hourly republishing and shutdown
//! - `actions`: summed price queries and cost calculation
//! - `config`: YAML configuration and validation
//! - `logging`: structured logging and tracing

pub mod actions;
pub mod cache;
pub mod calculator;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalizer;
pub mod orchestrator;
pub mod prices;
pub mod retry;
pub mod source;
pub mod time;

// Re-export commonly used types
pub use actions::PriceActions;
pub use config::Config;
pub use error::{ElspotError, Result};
pub use orchestrator::{PriceService, RefreshOrchestrator};
pub use prices::{Channel, Currency, PriceComponent, PriceMap};
