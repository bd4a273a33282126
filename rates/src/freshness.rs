//! TTL check that decides whether a query must refresh first.

use chrono::Duration;
use tracing::{debug, info};
use valuta_common::time::is_older_than;
use valuta_common::Timestamp;

use crate::aggregator::{RateAggregator, UpdateResult};
use crate::cache::RateCache;
use crate::error::{RateError, RateResult};

/// Cache state relative to the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// `last_refresh` older than the TTL.
    Expired,
    /// No usable `last_refresh` recorded.
    NeverRefreshed,
}

impl Freshness {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FreshnessGate {
    ttl: Duration,
}

impl FreshnessGate {
    pub fn new(ttl_seconds: u64) -> Self {
        let secs = i64::try_from(ttl_seconds).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        Self {
            ttl: Duration::seconds(secs),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Classify `cache` at `now`.
    pub fn check(&self, cache: &RateCache, now: Timestamp) -> Freshness {
        match cache.last_refresh {
            None => Freshness::NeverRefreshed,
            Some(at) if is_older_than(at, now, self.ttl) => Freshness::Expired,
            Some(_) => Freshness::Fresh,
        }
    }

    /// Refresh through `aggregator` when `cache` is stale at `now`.
    ///
    /// Returns the update that ran, or `None` when the cache was fresh. A
    /// refresh that yields no rates fails with `NoRatesAvailable`.
    pub async fn ensure_fresh(
        &self,
        cache: &RateCache,
        now: Timestamp,
        aggregator: &RateAggregator,
    ) -> RateResult<Option<UpdateResult>> {
        let freshness = self.check(cache, now);
        if !freshness.needs_refresh() {
            debug!(last_refresh = ?cache.last_refresh, "Cache is fresh");
            return Ok(None);
        }

        info!(?freshness, "Cache is stale, refreshing");
        let result = aggregator.run_update_at(now).await?;

        if !result.has_rates() {
            return Err(RateError::NoRatesAvailable {
                failed_sources: result.failed_sources,
            });
        }

        Ok(Some(result))
    }
}
