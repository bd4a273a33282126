//! Error types shared across ValutaTrade crates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the shared currency and persistence helpers.
#[derive(Error, Debug)]
pub enum CommonError {
    /// Code is not 2-5 uppercase letters.
    #[error("Invalid currency code '{0}': expected 2-5 letters")]
    InvalidCurrencyCode(String),

    /// Code is well formed but not in the registry.
    #[error("Unknown currency '{0}'")]
    CurrencyNotFound(String),

    /// Pair key is not `FROM_TO`.
    #[error("Invalid pair key '{0}': expected FROM_TO")]
    InvalidPairKey(String),

    /// Filesystem failure while reading or writing a data file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Data file exists but does not hold the expected JSON.
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CommonError {
    /// Get error code for log lines and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            CommonError::CurrencyNotFound(_) => "CURRENCY_NOT_FOUND",
            CommonError::InvalidPairKey(_) => "INVALID_PAIR_KEY",
            CommonError::Io { .. } => "IO_ERROR",
            CommonError::Json { .. } => "MALFORMED_DATA",
        }
    }
}

/// Result type alias for the shared helpers.
pub type Result<T> = std::result::Result<T, CommonError>;
