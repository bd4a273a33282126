//! Wallet error types.

use rust_decimal::Decimal;
use thiserror::Error;
use valuta_common::{CommonError, Currency};
use valuta_rates::RateError;

/// Errors raised by account and trading operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("User with id={0} not found")]
    UnknownUserId(u64),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Invalid password")]
    InvalidPassword,

    /// Username or password failed validation.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient funds: available {available} {code}, required {required} {code}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
        code: Currency,
    },

    #[error("You have no {0} wallet. It is created automatically on the first purchase.")]
    WalletNotFound(Currency),

    #[error("Portfolio for user id={0} not found")]
    PortfolioNotFound(u64),

    /// A balance or valuation left the representable range.
    #[error("Value out of range: {0}")]
    Overflow(String),

    /// Unknown currency or a users/portfolios file failure.
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Rates(#[from] RateError),
}

impl WalletError {
    /// Get error code for log lines and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::UserNotFound(_) | WalletError::UnknownUserId(_) => "USER_NOT_FOUND",
            WalletError::UsernameTaken(_) => "USERNAME_TAKEN",
            WalletError::InvalidPassword => "INVALID_PASSWORD",
            WalletError::InvalidInput(_) => "INVALID_INPUT",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            WalletError::PortfolioNotFound(_) => "PORTFOLIO_NOT_FOUND",
            WalletError::Overflow(_) => "OVERFLOW",
            WalletError::Common(e) => e.error_code(),
            WalletError::Rates(e) => e.error_code(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletError::Rates(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error concerns an unknown or malformed currency code.
    pub fn is_currency_error(&self) -> bool {
        matches!(
            self,
            WalletError::Common(CommonError::CurrencyNotFound(_))
                | WalletError::Common(CommonError::InvalidCurrencyCode(_))
        )
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = std::result::Result<T, WalletError>;
