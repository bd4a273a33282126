//! Append-only rate history records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use valuta_common::time::{format_iso, iso_timestamp};
use valuta_common::{Currency, CurrencyPair, Timestamp};

/// One observed rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub rate: Decimal,
    #[serde(with = "iso_timestamp")]
    pub observed_at: Timestamp,
    pub source: String,
}

impl RateQuote {
    /// Directed pair of this quote.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.from_currency.clone(), self.to_currency.clone())
    }
}

/// A quote as written to the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Identity key `{FROM}_{TO}_{timestamp}`.
    pub id: String,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub rate: Decimal,
    #[serde(with = "iso_timestamp")]
    pub timestamp: Timestamp,
    pub source: String,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl HistoryRecord {
    /// Build the record for `pair` observed at `timestamp`.
    pub fn new(pair: &CurrencyPair, rate: Decimal, source: &str, timestamp: Timestamp) -> Self {
        Self {
            id: identity_key(pair, timestamp),
            from_currency: pair.from.clone(),
            to_currency: pair.to.clone(),
            rate,
            timestamp,
            source: source.to_string(),
            meta: serde_json::Map::new(),
        }
    }

    /// The record as a quote.
    pub fn quote(&self) -> RateQuote {
        RateQuote {
            from_currency: self.from_currency.clone(),
            to_currency: self.to_currency.clone(),
            rate: self.rate,
            observed_at: self.timestamp,
            source: self.source.clone(),
        }
    }
}

/// Deduplication key for a pair observed at a given instant.
pub fn identity_key(pair: &CurrencyPair, timestamp: Timestamp) -> String {
    format!("{}_{}", pair.key(), format_iso(&timestamp))
}
