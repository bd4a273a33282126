//! Rate engine error types.

use std::fmt;

use thiserror::Error;
use valuta_common::{CommonError, CurrencyPair};

/// Classification of a single source's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// HTTP 429.
    RateLimited,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// Connection, DNS, TLS or timeout failure.
    Network,
    /// Unexpected non-success HTTP status.
    Status,
    /// Body was not the expected JSON or the provider reported an error.
    MalformedResponse,
    /// Source cannot run with the current configuration (e.g. missing key).
    Configuration,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchErrorKind::RateLimited => "rate limited",
            FetchErrorKind::Unauthorized => "unauthorized",
            FetchErrorKind::Forbidden => "forbidden",
            FetchErrorKind::Network => "network failure",
            FetchErrorKind::Status => "http error",
            FetchErrorKind::MalformedResponse => "malformed response",
            FetchErrorKind::Configuration => "misconfigured",
        };
        f.write_str(label)
    }
}

/// Failure of one rate source. Never fatal to an aggregation run.
#[derive(Debug, Clone, Error)]
#[error("{source_name}: {reason}")]
pub struct FetchError {
    /// Name of the failing source.
    pub source_name: String,
    /// Failure class.
    pub kind: FetchErrorKind,
    /// Human-readable reason.
    pub reason: String,
}

impl FetchError {
    /// Create a new fetch error.
    pub fn new(source_name: impl Into<String>, kind: FetchErrorKind, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// Check if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::RateLimited | FetchErrorKind::Network | FetchErrorKind::Status
        )
    }
}

/// Errors that can occur in the rate engine.
#[derive(Debug, Error)]
pub enum RateError {
    /// A single source failed; surfaced only when a caller targets that source.
    #[error("Rate source error: {0}")]
    Fetch(#[from] FetchError),

    /// A refresh produced zero rates.
    #[error("No rates available: every source failed or returned nothing (failed: {})", format_sources(.failed_sources))]
    NoRatesAvailable { failed_sources: Vec<String> },

    /// Direct, inverse and triangulated lookups all missed.
    #[error("Rate not found for {0}")]
    RateNotFound(CurrencyPair),

    /// A stored entry holds a non-positive or non-numeric rate.
    #[error("Stored rate for {pair} is invalid: {reason}")]
    StaleDataIntegrity { pair: CurrencyPair, reason: String },

    /// No configured source carries this name.
    #[error("Unknown rate source '{0}'")]
    UnknownSource(String),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache or history file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] CommonError),
}

fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        "none".to_string()
    } else {
        sources.join(", ")
    }
}

impl RateError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            RateError::Fetch(e) => e.is_transient(),
            RateError::NoRatesAvailable { .. } => true,
            _ => false,
        }
    }

    /// Get error code for log lines and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            RateError::Fetch(_) => "FETCH_ERROR",
            RateError::NoRatesAvailable { .. } => "NO_RATES_AVAILABLE",
            RateError::RateNotFound(_) => "RATE_NOT_FOUND",
            RateError::StaleDataIntegrity { .. } => "STALE_DATA_INTEGRITY",
            RateError::UnknownSource(_) => "UNKNOWN_SOURCE",
            RateError::Configuration(_) => "CONFIGURATION_ERROR",
            RateError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Result type for rate operations.
pub type RateResult<T> = Result<T, RateError>;
