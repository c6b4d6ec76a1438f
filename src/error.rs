//! Error taxonomy shared by the collector, the store and the query API.
//!
//! - [`TrackerError`] - failures a caller of the query/write path can get back.
//! - [`ConfigError`] - rejected collector settings.
//! - [`ProbeFailure`] - the platform couldn't tell what the user is doing right now.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Malformed input: bad dates, inverted ranges, empty project names, `end_time <= start_time`.
    #[error("validation error: {0}")]
    Validation(String),

    /// Lookup or update of a record that doesn't exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Durable storage failed. Never retried silently.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TrackerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Transient inability to read the foreground window. Recovered by skipping the sample.
#[derive(Error, Debug)]
#[error("failed to probe activity: {0:#}")]
pub struct ProbeFailure(pub anyhow::Error);

pub type Result<T> = std::result::Result<T, TrackerError>;
