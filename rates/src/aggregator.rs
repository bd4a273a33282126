//! Fan-out over every rate source and persistence of the merged batch.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use valuta_common::time::{self, iso_timestamp};
use valuta_common::Timestamp;

use crate::error::{RateError, RateResult};
use crate::source::{RateBatch, RateSource};
use crate::store::RateStore;

/// Source label written to the cache and history for aggregated batches.
pub const AGGREGATOR_SOURCE: &str = "ParserService";

/// Outcome of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    /// Distinct pairs in the merged batch.
    pub total_rates: usize,
    pub successful_sources: Vec<String>,
    pub failed_sources: Vec<String>,
    #[serde(with = "iso_timestamp")]
    pub timestamp: Timestamp,
}

impl UpdateResult {
    /// True when the run produced at least one rate.
    pub fn has_rates(&self) -> bool {
        self.total_rates > 0
    }
}

/// Runs every configured source and writes the merged result to the store.
pub struct RateAggregator {
    sources: Vec<Arc<dyn RateSource>>,
    store: Arc<RateStore>,
}

impl RateAggregator {
    pub fn new(sources: Vec<Arc<dyn RateSource>>, store: Arc<RateStore>) -> Self {
        Self { sources, store }
    }

    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// Run all sources and stamp the batch with the current time.
    pub async fn run_update(&self) -> RateResult<UpdateResult> {
        self.run_update_at(time::now()).await
    }

    /// Run all sources and stamp the batch with `timestamp`.
    pub async fn run_update_at(&self, timestamp: Timestamp) -> RateResult<UpdateResult> {
        let sources: Vec<&Arc<dyn RateSource>> = self.sources.iter().collect();
        self.run(&sources, timestamp).await
    }

    /// Run only the sources whose name matches `filter`.
    ///
    /// Matching ignores case and punctuation, so `exchangerate` selects
    /// `ExchangeRate-API`.
    pub async fn run_update_from(&self, filter: &str) -> RateResult<UpdateResult> {
        let wanted = normalize(filter);
        let sources: Vec<&Arc<dyn RateSource>> = self
            .sources
            .iter()
            .filter(|s| !wanted.is_empty() && normalize(s.name()).contains(&wanted))
            .collect();

        if sources.is_empty() {
            return Err(RateError::UnknownSource(filter.to_string()));
        }

        self.run(&sources, time::now()).await
    }

    #[instrument(skip(self, sources), fields(source_count = sources.len()))]
    async fn run(&self, sources: &[&Arc<dyn RateSource>], timestamp: Timestamp) -> RateResult<UpdateResult> {
        info!("Starting rates update");

        let outcomes = join_all(sources.iter().map(|source| source.fetch_rates())).await;

        let mut merged = RateBatch::new();
        let mut successful_sources = Vec::new();
        let mut failed_sources = Vec::new();

        // Outcomes keep source order; later sources win on shared pairs.
        for (source, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Ok(batch) => {
                    info!(source = source.name(), rates = batch.len(), "Source fetched");
                    for (pair, rate) in batch {
                        if let Some(previous) = merged.insert(pair.clone(), rate) {
                            warn!(
                                source = source.name(),
                                pair = %pair,
                                previous = %previous,
                                rate = %rate,
                                "Pair reported by more than one source"
                            );
                        }
                    }
                    successful_sources.push(source.name().to_string());
                }
                Err(e) => {
                    error!(source = source.name(), kind = %e.kind, error = %e.reason, "Source failed");
                    failed_sources.push(source.name().to_string());
                }
            }
        }

        if merged.is_empty() {
            warn!(failed = ?failed_sources, "No rates fetched from any source");
            return Ok(UpdateResult {
                total_rates: 0,
                successful_sources,
                failed_sources,
                timestamp,
            });
        }

        self.store.save_rates(&merged, AGGREGATOR_SOURCE, timestamp)?;

        info!(
            rates = merged.len(),
            successful = successful_sources.len(),
            failed = failed_sources.len(),
            "Rates update completed"
        );

        Ok(UpdateResult {
            total_rates: merged.len(),
            successful_sources,
            failed_sources,
            timestamp,
        })
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::source::{FailingRateSource, MockRateSource};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store(dir: &TempDir) -> Arc<RateStore> {
        Arc::new(
            RateStore::open(dir.path().join("rates.json"), dir.path().join("exchange_rates.json")).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(FailingRateSource::new("CoinGecko", FetchErrorKind::RateLimited)),
            Arc::new(MockRateSource::new("Mock").with_rate("EUR_USD", dec!(1.08))),
            Arc::new(FailingRateSource::new("ExchangeRate-API", FetchErrorKind::Network)),
        ];
        let aggregator = RateAggregator::new(sources, store.clone());

        let result = aggregator.run_update_at(ts(0)).await.unwrap();

        assert_eq!(result.total_rates, 1);
        assert_eq!(result.successful_sources, vec!["Mock"]);
        assert_eq!(result.failed_sources, vec!["CoinGecko", "ExchangeRate-API"]);
        assert_eq!(result.timestamp, ts(0));

        let cache = store.get_cache();
        let entry = cache.get(&"EUR_USD".parse().unwrap()).unwrap();
        assert_eq!(entry.rate, Some(dec!(1.08)));
        assert_eq!(entry.source, AGGREGATOR_SOURCE);
        assert_eq!(store.get_history(None, None, None).len(), 1);
    }

    #[tokio::test]
    async fn test_all_failed_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(FailingRateSource::new("a", FetchErrorKind::Network)),
            Arc::new(FailingRateSource::new("b", FetchErrorKind::Unauthorized)),
        ];
        let aggregator = RateAggregator::new(sources, store.clone());

        let result = aggregator.run_update_at(ts(0)).await.unwrap();

        assert_eq!(result.total_rates, 0);
        assert!(!result.has_rates());
        assert_eq!(result.failed_sources.len(), 2);
        assert!(store.get_cache().last_refresh.is_none());
        assert!(!dir.path().join("rates.json").exists());
    }

    #[tokio::test]
    async fn test_last_source_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(MockRateSource::new("first").with_rate("EUR_USD", dec!(1.07))),
            Arc::new(MockRateSource::new("second").with_rate("EUR_USD", dec!(1.09))),
        ];
        let aggregator = RateAggregator::new(sources, store.clone());

        let result = aggregator.run_update_at(ts(0)).await.unwrap();

        assert_eq!(result.total_rates, 1);
        let cache = store.get_cache();
        assert_eq!(cache.get(&"EUR_USD".parse().unwrap()).unwrap().rate, Some(dec!(1.09)));
    }

    #[tokio::test]
    async fn test_source_filter() {
        let dir = TempDir::new().unwrap();
        let crypto = Arc::new(MockRateSource::new("CoinGecko").with_rate("BTC_USD", dec!(59000)));
        let fiat = Arc::new(MockRateSource::new("ExchangeRate-API").with_rate("USD_EUR", dec!(0.92)));
        let sources: Vec<Arc<dyn RateSource>> = vec![crypto.clone(), fiat.clone()];
        let aggregator = RateAggregator::new(sources, store(&dir));

        let result = aggregator.run_update_from("exchangerate").await.unwrap();

        assert_eq!(result.successful_sources, vec!["ExchangeRate-API"]);
        assert_eq!(crypto.call_count(), 0);
        assert_eq!(fiat.call_count(), 1);

        let err = aggregator.run_update_from("bloomberg").await.unwrap_err();
        assert!(matches!(err, RateError::UnknownSource(_)));
    }
}
