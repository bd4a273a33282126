//! Point-in-time rate cache and its monotone merge rule.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use valuta_common::time::lenient_timestamp;
use valuta_common::{CurrencyPair, Timestamp};

use crate::source::RateBatch;

/// Latest known state of one directed pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Stored rate; `None` when the file held something non-numeric.
    #[serde(with = "lenient_rate")]
    pub rate: Option<Decimal>,
    /// Observation time of the stored rate. `None` sorts before any
    /// observation, so the next merge always replaces it.
    #[serde(default, with = "lenient_timestamp")]
    pub updated_at: Option<Timestamp>,
    /// Label of the writer.
    pub source: String,
}

impl CacheEntry {
    /// Create an entry for a freshly observed rate.
    pub fn new(rate: Decimal, updated_at: Timestamp, source: impl Into<String>) -> Self {
        Self {
            rate: Some(rate),
            updated_at: Some(updated_at),
            source: source.into(),
        }
    }

    /// The rate if it is numeric and strictly positive.
    pub fn valid_rate(&self) -> Result<Decimal, String> {
        match self.rate {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            Some(rate) => Err(format!("non-positive rate {}", rate)),
            None => Err("non-numeric rate".to_string()),
        }
    }
}

/// Latest rate per pair plus the time of the last refresh attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateCache {
    /// Entries with an invalid key or shape are dropped on load.
    #[serde(default, with = "lenient_pairs")]
    pub pairs: BTreeMap<CurrencyPair, CacheEntry>,
    /// Absent, `null`, or unparsable in the file all load as `None`.
    #[serde(default, with = "lenient_timestamp")]
    pub last_refresh: Option<Timestamp>,
}

impl RateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a directed pair.
    pub fn get(&self, pair: &CurrencyPair) -> Option<&CacheEntry> {
        self.pairs.get(pair)
    }

    /// Get the number of cached pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Merge a batch observed at `timestamp`.
    ///
    /// An entry is replaced only when `timestamp >= updated_at`, so replaying
    /// batches in any order converges on the newest observation per pair.
    /// `last_refresh` is set to `timestamp` whether or not any entry changed.
    /// Returns how many entries were written.
    pub fn merge(&mut self, batch: &RateBatch, source: &str, timestamp: Timestamp) -> usize {
        let mut updated = 0;

        for (pair, rate) in batch {
            let newer = self
                .pairs
                .get(pair)
                .and_then(|existing| existing.updated_at)
                .map_or(true, |stored| timestamp >= stored);

            if newer {
                self.pairs
                    .insert(pair.clone(), CacheEntry::new(*rate, timestamp, source));
                updated += 1;
            } else {
                debug!(pair = %pair, "Skipping older observation");
            }
        }

        self.last_refresh = Some(timestamp);
        updated
    }
}

/// Serde adapter reading a rate as `None` when it is not a number.
mod lenient_rate {
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::Number(n) => n
                .to_string()
                .parse::<Decimal>()
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
            Value::String(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        })
    }
}

/// Serde adapter for the pair map that skips unusable entries.
mod lenient_pairs {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;
    use tracing::warn;
    use valuta_common::CurrencyPair;

    use super::CacheEntry;

    pub fn serialize<S>(value: &BTreeMap<CurrencyPair, CacheEntry>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<CurrencyPair, CacheEntry>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut pairs = BTreeMap::new();

        for (key, value) in raw {
            let pair = match key.parse::<CurrencyPair>() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping cache entry with invalid pair key");
                    continue;
                }
            };
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => {
                    pairs.insert(pair, entry);
                }
                Err(e) => warn!(pair = %pair, error = %e, "Dropping malformed cache entry"),
            }
        }

        Ok(pairs)
    }
}
