//! ValutaTrade Rate Engine
//!
//! Fetches exchange rates from external sources, keeps a durable cache and an
//! append-only history, and resolves arbitrary currency pairs.
//!
//! # Features
//!
//! - Parallel fan-out over rate sources, tolerant of partial failure
//! - Monotone cache merge: older observations never replace newer ones
//! - TTL based refresh on query plus an optional background scheduler
//! - Direct, inverse and hub-triangulated pair resolution
//!
//! # Example
//!
//! ```rust,ignore
//! use valuta_rates::{RateService, RatesConfig};
//! use valuta_common::Currency;
//!
//! let service = RateService::from_config(RatesConfig::from_env())?;
//!
//! // Refreshes first if the cache is older than the TTL
//! let quote = service.get_rate(&Currency::eur(), &Currency::btc()).await?;
//! println!("EUR->BTC {} via {:?}", quote.rate, quote.method);
//! ```

pub mod aggregator;
pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod freshness;
pub mod history;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod store;

pub use aggregator::{RateAggregator, UpdateResult, AGGREGATOR_SOURCE};
pub use cache::{CacheEntry, RateCache};
pub use config::RatesConfig;
pub use error::{FetchError, FetchErrorKind, RateError, RateResult};
pub use freshness::{Freshness, FreshnessGate};
pub use history::{HistoryRecord, RateQuote};
pub use resolver::{RateResolver, Resolution, ResolutionMethod};
pub use scheduler::{RefreshScheduler, SchedulerState};
pub use service::{ListingFilter, ListingRow, RateListing, RateService};
pub use source::{RateBatch, RateSource};
pub use store::RateStore;
