//! Currency codes and directed currency pairs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// Separator between the two codes of a pair key.
pub const PAIR_SEPARATOR: char = '_';

/// Currency code (ISO 4217 for fiat, ticker for crypto).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code without validation.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Parse and validate a user supplied code.
    ///
    /// Input is trimmed and upper-cased; the result must be 2-5 ASCII letters.
    pub fn parse(code: &str) -> Result<Self, CommonError> {
        let normalized = code.trim().to_uppercase();
        let valid = (2..=5).contains(&normalized.len())
            && normalized.chars().all(|c| c.is_ascii_uppercase());

        if !valid {
            return Err(CommonError::InvalidCurrencyCode(code.to_string()));
        }

        Ok(Self(normalized))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn btc() -> Self {
        Self::new("BTC")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for Currency {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A directed currency pair, serialised as its pair key `"{FROM}_{TO}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    /// Currency being priced.
    pub from: Currency,
    /// Currency the price is expressed in.
    pub to: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// The pair key used by the cache and history files.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.from, PAIR_SEPARATOR, self.to)
    }

    /// Whether either side of the pair is `currency`.
    pub fn involves(&self, currency: &Currency) -> bool {
        &self.from == currency || &self.to == currency
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.from, PAIR_SEPARATOR, self.to)
    }
}

impl FromStr for CurrencyPair {
    type Err = CommonError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (from, to) = key
            .split_once(PAIR_SEPARATOR)
            .ok_or_else(|| CommonError::InvalidPairKey(key.to_string()))?;

        let from = Currency::parse(from).map_err(|_| CommonError::InvalidPairKey(key.to_string()))?;
        let to = Currency::parse(to).map_err(|_| CommonError::InvalidPairKey(key.to_string()))?;

        Ok(Self { from, to })
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = CommonError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        key.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.key()
    }
}
