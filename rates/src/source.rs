//! Rate source trait and test doubles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use valuta_common::CurrencyPair;

use crate::error::FetchError;

/// A batch of rates keyed by directed pair.
pub type RateBatch = BTreeMap<CurrencyPair, Decimal>;

/// Trait for external rate sources.
///
/// A source either returns its complete batch or fails; it never returns a
/// partial result and never retries internally.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name used in logs and update results.
    fn name(&self) -> &str;

    /// Fetch every pair this source covers.
    async fn fetch_rates(&self) -> Result<RateBatch, FetchError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{FailingRateSource, MockRateSource};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use dashmap::DashMap;
    use rust_decimal::Decimal;
    use valuta_common::CurrencyPair;

    use super::{RateBatch, RateSource};
    use crate::error::{FetchError, FetchErrorKind};

    /// In-memory rate source for tests.
    pub struct MockRateSource {
        name: String,
        rates: DashMap<CurrencyPair, Decimal>,
        calls: AtomicUsize,
    }

    impl MockRateSource {
        /// Create a new mock source with no rates.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                rates: DashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        /// Builder form of `set_rate` taking a pair key.
        pub fn with_rate(self, key: &str, rate: Decimal) -> Self {
            let pair = key.parse().expect("valid pair key in test fixture");
            self.set_rate(pair, rate);
            self
        }

        /// Set a rate for a currency pair.
        pub fn set_rate(&self, pair: CurrencyPair, rate: Decimal) {
            self.rates.insert(pair, rate);
        }

        /// How many times `fetch_rates` was called.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_rates(&self) -> Result<RateBatch, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rates
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect())
        }
    }

    /// Source that always fails with the configured kind.
    pub struct FailingRateSource {
        name: String,
        kind: FetchErrorKind,
        calls: AtomicUsize,
    }

    impl FailingRateSource {
        pub fn new(name: impl Into<String>, kind: FetchErrorKind) -> Self {
            Self {
                name: name.into(),
                kind,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for FailingRateSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_rates(&self) -> Result<RateBatch, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::new(&self.name, self.kind, format!("simulated {}", self.kind)))
        }
    }
}
