//! Facade over store, aggregator, gate and resolver.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};
use valuta_common::time::{self, lenient_timestamp};
use valuta_common::{Currency, CurrencyPair, Timestamp};

use crate::aggregator::{RateAggregator, UpdateResult};
use crate::cache::RateCache;
use crate::clients::default_sources;
use crate::config::RatesConfig;
use crate::error::{RateError, RateResult};
use crate::freshness::FreshnessGate;
use crate::history::HistoryRecord;
use crate::resolver::{RateResolver, Resolution};
use crate::scheduler::RefreshScheduler;
use crate::source::RateSource;
use crate::store::RateStore;

/// Options for listing cached rates.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// Keep rows whose from-currency matches.
    pub currency: Option<Currency>,
    /// Re-express every cached currency in this base.
    pub base: Option<Currency>,
    /// Keep the N highest rates.
    pub top: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRow {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    #[serde(with = "lenient_timestamp")]
    pub updated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateListing {
    pub rows: Vec<ListingRow>,
    #[serde(with = "lenient_timestamp")]
    pub last_refresh: Option<Timestamp>,
}

/// Entry point for rate queries and refreshes.
pub struct RateService {
    config: RatesConfig,
    store: Arc<RateStore>,
    aggregator: Arc<RateAggregator>,
    resolver: RateResolver,
    gate: FreshnessGate,
}

impl RateService {
    /// Build the service with the production HTTP sources.
    pub fn from_config(config: RatesConfig) -> RateResult<Self> {
        config.validate().map_err(RateError::Configuration)?;
        let sources = default_sources(&config)?;
        Self::new(config, sources)
    }

    /// Build the service over the given sources.
    pub fn new(config: RatesConfig, sources: Vec<Arc<dyn RateSource>>) -> RateResult<Self> {
        let store = Arc::new(RateStore::from_config(&config)?);
        let aggregator = Arc::new(RateAggregator::new(sources, store.clone()));

        Ok(Self {
            resolver: RateResolver::new(config.base_currency.clone()),
            gate: FreshnessGate::new(config.ttl_seconds),
            config,
            store,
            aggregator,
        })
    }

    pub fn config(&self) -> &RatesConfig {
        &self.config
    }

    pub fn base_currency(&self) -> &Currency {
        &self.config.base_currency
    }

    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// Scheduler driving this service's aggregator.
    pub fn scheduler(&self) -> Arc<RefreshScheduler> {
        Arc::new(RefreshScheduler::from_config(self.aggregator.clone(), &self.config))
    }

    /// Resolve `from -> to`, refreshing first if the cache is stale.
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> RateResult<Resolution> {
        self.get_rate_at(from, to, time::now()).await
    }

    #[instrument(skip(self, from, to), fields(from = %from, to = %to))]
    pub async fn get_rate_at(&self, from: &Currency, to: &Currency, now: Timestamp) -> RateResult<Resolution> {
        if from == to {
            return self.resolver.resolve_detailed(&RateCache::default(), from, to);
        }

        self.gate
            .ensure_fresh(&self.store.get_cache(), now, &self.aggregator)
            .await?;

        self.resolver.resolve_detailed(&self.store.get_cache(), from, to)
    }

    /// Run every source now. Fails when nothing was fetched.
    pub async fn refresh_now(&self) -> RateResult<UpdateResult> {
        self.refresh_from(None).await
    }

    /// Run one named source, or all of them when `source` is `None`.
    #[instrument(skip(self))]
    pub async fn refresh_from(&self, source: Option<&str>) -> RateResult<UpdateResult> {
        let result = match source {
            Some(name) => self.aggregator.run_update_from(name).await?,
            None => self.aggregator.run_update().await?,
        };

        if !result.has_rates() {
            return Err(RateError::NoRatesAvailable {
                failed_sources: result.failed_sources,
            });
        }
        Ok(result)
    }

    /// List cached rates without refreshing.
    pub fn cached_rates(&self, filter: &ListingFilter) -> RateResult<RateListing> {
        let cache = self.store.get_cache();

        let mut rows = match &filter.base {
            Some(base) => self.rows_in_base(&cache, base)?,
            None => cache
                .pairs
                .iter()
                .filter_map(|(pair, entry)| match entry.valid_rate() {
                    Ok(rate) => Some(ListingRow {
                        pair: pair.clone(),
                        rate,
                        updated_at: entry.updated_at,
                    }),
                    Err(reason) => {
                        warn!(pair = %pair, reason = %reason, "Skipping invalid cache entry");
                        None
                    }
                })
                .collect::<Vec<_>>(),
        };

        if let Some(currency) = &filter.currency {
            rows.retain(|row| &row.pair.from == currency);
        }

        match filter.top {
            Some(top) => {
                rows.sort_by(|a, b| b.rate.cmp(&a.rate));
                rows.truncate(top);
            }
            None => rows.sort_by(|a, b| a.pair.cmp(&b.pair)),
        }

        Ok(RateListing {
            rows,
            last_refresh: cache.last_refresh,
        })
    }

    fn rows_in_base(&self, cache: &RateCache, base: &Currency) -> RateResult<Vec<ListingRow>> {
        let currencies: BTreeSet<&Currency> = cache
            .pairs
            .keys()
            .flat_map(|pair| [&pair.from, &pair.to])
            .filter(|c| *c != base)
            .collect();

        let mut rows = Vec::with_capacity(currencies.len());
        for currency in currencies {
            match self.resolver.resolve_detailed(cache, currency, base) {
                Ok(resolution) => rows.push(ListingRow {
                    pair: resolution.pair,
                    rate: resolution.rate,
                    updated_at: resolution.updated_at,
                }),
                Err(RateError::RateNotFound(pair)) => {
                    warn!(pair = %pair, "No path to base currency");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(rows)
    }

    /// History, newest first.
    pub fn history(
        &self,
        from: Option<&Currency>,
        to: Option<&Currency>,
        limit: Option<usize>,
    ) -> Vec<HistoryRecord> {
        self.store.get_history(from, to, limit)
    }
}
