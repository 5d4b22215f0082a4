//! Error types and handling for Elspot
//!
//! This module defines the error types used throughout the crate. Every
//! failure of the fetch collaborator is mapped onto one of these variants at
//! the refresh boundary, and [`ElspotError::kind`] folds them into the small
//! taxonomy the retry logic reasons about.

use thiserror::Error;

/// Result type alias for Elspot operations
pub type Result<T> = std::result::Result<T, ElspotError>;

/// Main error type for Elspot
#[derive(Debug, Error)]
pub enum ElspotError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Non-2xx response or transport failure talking to the data source
    #[error("Communication error: {message}")]
    Communication {
        status: Option<u16>,
        message: String,
    },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Malformed or unexpected payload
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The data source answered without any records
    #[error("Empty response: {message}")]
    Empty { message: String },

    /// Fewer records than the minimum expected lookahead
    #[error("Data incomplete: expected at least {expected} records, got {actual}")]
    DataIncomplete { expected: usize, actual: usize },

    /// Unknown price element name
    #[error("'{name}' has no corresponding value. Accepted values: {accepted}")]
    UnknownPriceElement { name: String, accepted: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Work was abandoned because shutdown was requested
    #[error("Cancelled: {message}")]
    Cancelled { message: String },
}

/// Coarse classification used to pick the next retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid or missing identifiers; fixed by external reconfiguration
    Configuration,
    /// Transport failure, non-2xx status or timeout
    Communication,
    /// Malformed payload, treated as transient
    Parse,
    /// Not enough lookahead data
    DataIncomplete,
    /// Shutdown in progress
    Cancelled,
}

impl ElspotError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ElspotError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        ElspotError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a communication error carrying the HTTP status
    pub fn http_status<S: Into<String>>(status: u16, message: S) -> Self {
        ElspotError::Communication {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a communication error without a status (transport failure)
    pub fn communication<S: Into<String>>(message: S) -> Self {
        ElspotError::Communication {
            status: None,
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ElspotError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        ElspotError::Parse {
            message: message.into(),
        }
    }

    /// Create a new empty-response error
    pub fn empty<S: Into<String>>(message: S) -> Self {
        ElspotError::Empty {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ElspotError::Io {
            message: message.into(),
        }
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        ElspotError::Cancelled {
            message: message.into(),
        }
    }

    /// HTTP status attached to a communication error, if any
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            ElspotError::Communication { status, .. } => *status,
            _ => None,
        }
    }

    /// Map onto the retry taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ElspotError::Config { .. }
            | ElspotError::Validation { .. }
            | ElspotError::UnknownPriceElement { .. } => ErrorKind::Configuration,
            ElspotError::Communication { .. }
            | ElspotError::Timeout { .. }
            | ElspotError::Empty { .. }
            | ElspotError::Io { .. } => ErrorKind::Communication,
            ElspotError::Parse { .. } | ElspotError::Serialization { .. } => ErrorKind::Parse,
            ElspotError::DataIncomplete { .. } => ErrorKind::DataIncomplete,
            ElspotError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether another attempt may succeed without outside intervention.
    /// Configuration errors are still retried, just on a long cadence.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Cancelled
    }
}

impl From<std::io::Error> for ElspotError {
    fn from(err: std::io::Error) -> Self {
        ElspotError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ElspotError {
    fn from(err: serde_yaml::Error) -> Self {
        ElspotError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ElspotError {
    fn from(err: serde_json::Error) -> Self {
        ElspotError::parse(err.to_string())
    }
}

#[cfg(feature = "energidataservice")]
impl From<reqwest::Error> for ElspotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ElspotError::timeout(err.to_string());
        }
        if err.is_decode() {
            return ElspotError::parse(err.to_string());
        }
        match err.status() {
            Some(status) => ElspotError::http_status(status.as_u16(), err.to_string()),
            None => ElspotError::communication(err.to_string()),
        }
    }
}

impl From<chrono::ParseError> for ElspotError {
    fn from(err: chrono::ParseError) -> Self {
        ElspotError::validation("datetime", err.to_string())
    }
}
