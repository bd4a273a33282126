//! Durable rate cache and history.
//!
//! Both files are held in memory and rewritten whole on every mutation. A
//! mutation is applied to a copy, the copy is saved, and only then does it
//! replace the in-memory state, so a failed write leaves both in agreement.
//!
//! Writes are synchronous and happen while the state lock is held, so one
//! save blocks the calling runtime worker for its duration. The files are a
//! few kilobytes and written at most once per refresh.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};
use valuta_common::persist::{load_json, save_json};
use valuta_common::{Currency, Timestamp};

use crate::cache::RateCache;
use crate::config::RatesConfig;
use crate::error::RateResult;
use crate::history::HistoryRecord;
use crate::source::RateBatch;

struct StoreState {
    cache: RateCache,
    history: Vec<HistoryRecord>,
    history_ids: HashSet<String>,
}

/// Sole owner of the cache and history files.
pub struct RateStore {
    cache_path: PathBuf,
    history_path: PathBuf,
    state: Mutex<StoreState>,
}

impl RateStore {
    /// Open the store, starting empty when either file is missing.
    pub fn open(cache_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> RateResult<Self> {
        let cache_path = cache_path.into();
        let history_path = history_path.into();

        let cache: RateCache = load_json(&cache_path)?;
        let history: Vec<HistoryRecord> = load_json(&history_path)?;
        let history_ids = history.iter().map(|r| r.id.clone()).collect();

        debug!(
            cache = %cache_path.display(),
            pairs = cache.len(),
            history = history.len(),
            "Opened rate store"
        );

        Ok(Self {
            cache_path,
            history_path,
            state: Mutex::new(StoreState {
                cache,
                history,
                history_ids,
            }),
        })
    }

    /// Open the files named in `config`.
    pub fn from_config(config: &RatesConfig) -> RateResult<Self> {
        Self::open(&config.rates_file, &config.history_file)
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Append one record per pair, skipping identity keys already present.
    ///
    /// Returns the number of records added.
    pub fn append_history(&self, batch: &RateBatch, source: &str, timestamp: Timestamp) -> RateResult<usize> {
        let mut state = self.state.lock();

        let fresh: Vec<HistoryRecord> = batch
            .iter()
            .map(|(pair, rate)| HistoryRecord::new(pair, *rate, source, timestamp))
            .filter(|record| !state.history_ids.contains(&record.id))
            .collect();

        if fresh.is_empty() {
            debug!("No new history records");
            return Ok(0);
        }

        let mut history = state.history.clone();
        history.extend(fresh.iter().cloned());
        save_json(&self.history_path, &history)?;

        let added = fresh.len();
        state.history_ids.extend(fresh.into_iter().map(|r| r.id));
        state.history = history;

        info!(added, "Appended rates to history");
        Ok(added)
    }

    /// Merge a batch into the cache and persist it.
    ///
    /// Returns the number of entries written.
    pub fn merge_cache(&self, batch: &RateBatch, source: &str, timestamp: Timestamp) -> RateResult<usize> {
        let mut state = self.state.lock();

        let mut cache = state.cache.clone();
        let updated = cache.merge(batch, source, timestamp);
        save_json(&self.cache_path, &cache)?;
        state.cache = cache;

        info!(updated, "Updated rate cache");
        Ok(updated)
    }

    /// Record a batch in history, then merge it into the cache.
    pub fn save_rates(&self, batch: &RateBatch, source: &str, timestamp: Timestamp) -> RateResult<()> {
        self.append_history(batch, source, timestamp)?;
        self.merge_cache(batch, source, timestamp)?;
        Ok(())
    }

    /// Snapshot of the cache.
    pub fn get_cache(&self) -> RateCache {
        self.state.lock().cache.clone()
    }

    /// History filtered by pair sides, newest first.
    pub fn get_history(
        &self,
        from: Option<&Currency>,
        to: Option<&Currency>,
        limit: Option<usize>,
    ) -> Vec<HistoryRecord> {
        let state = self.state.lock();

        let mut records: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|r| from.map_or(true, |c| &r.from_currency == c))
            .filter(|r| to.map_or(true, |c| &r.to_currency == c))
            .cloned()
            .collect();

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }
}
