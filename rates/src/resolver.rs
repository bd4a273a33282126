//! Pair resolution over a cache snapshot.
//!
//! Lookup order: identity, direct entry, inverse entry, then a single hop
//! through the hub currency.

use rust_decimal::Decimal;
use serde::Serialize;
use valuta_common::{Currency, CurrencyPair, Timestamp};

use crate::cache::RateCache;
use crate::error::{RateError, RateResult};

/// How a rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Identity,
    Direct,
    Inverse,
    Triangulated,
}

/// A resolved rate with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub method: ResolutionMethod,
    /// Observation time of the entry used; the older leg when triangulated.
    pub updated_at: Option<Timestamp>,
}

/// Resolves arbitrary pairs against a cache.
#[derive(Debug, Clone)]
pub struct RateResolver {
    hub: Currency,
}

impl RateResolver {
    pub fn new(hub: Currency) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Currency {
        &self.hub
    }

    /// Rate for `from -> to`.
    pub fn resolve(&self, cache: &RateCache, from: &Currency, to: &Currency) -> RateResult<Decimal> {
        self.resolve_detailed(cache, from, to).map(|r| r.rate)
    }

    /// Rate for `from -> to` with the method and observation time used.
    pub fn resolve_detailed(
        &self,
        cache: &RateCache,
        from: &Currency,
        to: &Currency,
    ) -> RateResult<Resolution> {
        let pair = CurrencyPair::new(from.clone(), to.clone());

        if from == to {
            return Ok(Resolution {
                pair,
                rate: Decimal::ONE,
                method: ResolutionMethod::Identity,
                updated_at: None,
            });
        }

        if let Some(resolution) = self.lookup(cache, &pair)? {
            return Ok(resolution);
        }

        if from != &self.hub && to != &self.hub {
            let first = self.lookup(cache, &CurrencyPair::new(from.clone(), self.hub.clone()))?;
            let second = self.lookup(cache, &CurrencyPair::new(self.hub.clone(), to.clone()))?;

            if let (Some(first), Some(second)) = (first, second) {
                // An undated leg counts as the oldest.
                let updated_at = match (first.updated_at, second.updated_at) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    _ => None,
                };
                let rate = first
                    .rate
                    .checked_mul(second.rate)
                    .filter(|rate| !rate.is_zero())
                    .ok_or_else(|| RateError::RateNotFound(pair.clone()))?;
                return Ok(Resolution {
                    pair,
                    rate,
                    method: ResolutionMethod::Triangulated,
                    updated_at,
                });
            }
        }

        Err(RateError::RateNotFound(pair))
    }

    /// Direct or inverse lookup. `Ok(None)` when neither entry exists.
    fn lookup(&self, cache: &RateCache, pair: &CurrencyPair) -> RateResult<Option<Resolution>> {
        if let Some(entry) = cache.get(pair) {
            let rate = entry.valid_rate().map_err(|reason| RateError::StaleDataIntegrity {
                pair: pair.clone(),
                reason,
            })?;
            return Ok(Some(Resolution {
                pair: pair.clone(),
                rate,
                method: ResolutionMethod::Direct,
                updated_at: entry.updated_at,
            }));
        }

        let inverse = pair.inverse();
        if let Some(entry) = cache.get(&inverse) {
            let rate = entry.valid_rate().map_err(|reason| RateError::StaleDataIntegrity {
                pair: inverse.clone(),
                reason,
            })?;
            // 1/rate underflows to zero for rates beyond the Decimal range.
            let rate = Decimal::ONE
                .checked_div(rate)
                .filter(|inverted| !inverted.is_zero())
                .ok_or_else(|| RateError::StaleDataIntegrity {
                    pair: inverse.clone(),
                    reason: format!("rate {} cannot be inverted", rate),
                })?;
            return Ok(Some(Resolution {
                pair: pair.clone(),
                rate,
                method: ResolutionMethod::Inverse,
                updated_at: entry.updated_at,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RateBatch;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn cache(entries: &[(&str, Decimal)]) -> RateCache {
        let batch: RateBatch = entries
            .iter()
            .map(|(key, rate)| (key.parse().unwrap(), *rate))
            .collect();
        let mut cache = RateCache::new();
        cache.merge(&batch, "test", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        cache
    }

    fn resolver() -> RateResolver {
        RateResolver::new(Currency::usd())
    }

    fn c(code: &str) -> Currency {
        Currency::new(code)
    }

    #[test]
    fn test_identity() {
        let empty = RateCache::new();

        let resolution = resolver().resolve_detailed(&empty, &c("XYZ"), &c("XYZ")).unwrap();

        assert_eq!(resolution.rate, Decimal::ONE);
        assert_eq!(resolution.method, ResolutionMethod::Identity);
    }

    #[test]
    fn test_direct_and_inverse() {
        let cache = cache(&[("BTC_USD", dec!(59000))]);
        let resolver = resolver();

        let direct = resolver.resolve_detailed(&cache, &c("BTC"), &c("USD")).unwrap();
        assert_eq!(direct.rate, dec!(59000));
        assert_eq!(direct.method, ResolutionMethod::Direct);

        let inverse = resolver.resolve_detailed(&cache, &c("USD"), &c("BTC")).unwrap();
        assert_eq!(inverse.method, ResolutionMethod::Inverse);
        assert!((inverse.rate - dec!(0.0000169491525)).abs() < dec!(0.0000000001));
        assert!((inverse.rate * direct.rate - Decimal::ONE).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_triangulation_through_hub() {
        let cache = cache(&[("BTC_USD", dec!(59000)), ("EUR_USD", dec!(1.08))]);
        let resolver = resolver();

        let eur_btc = resolver.resolve_detailed(&cache, &c("EUR"), &c("BTC")).unwrap();
        assert_eq!(eur_btc.method, ResolutionMethod::Triangulated);
        assert!((eur_btc.rate - dec!(0.0000183051)).abs() < dec!(0.0000000001));

        let btc_eur = resolver.resolve(&cache, &c("BTC"), &c("EUR")).unwrap();
        assert!((btc_eur - dec!(54629.63)).abs() < dec!(0.01));
    }

    #[test]
    fn test_only_one_hop() {
        // GBP reaches USD only through EUR, which is two hops.
        let cache = cache(&[("GBP_EUR", dec!(1.17)), ("EUR_USD", dec!(1.08))]);

        let err = resolver().resolve(&cache, &c("GBP"), &c("JPY")).unwrap_err();

        assert!(matches!(err, RateError::RateNotFound(ref pair) if pair.key() == "GBP_JPY"));
    }

    #[test]
    fn test_missing_leg_names_requested_pair() {
        let cache = cache(&[("EUR_USD", dec!(1.08))]);

        let err = resolver().resolve(&cache, &c("EUR"), &c("BTC")).unwrap_err();

        assert_eq!(err.to_string(), "Rate not found for EUR_BTC");
    }

    #[test]
    fn test_hub_pair_does_not_triangulate() {
        let cache = cache(&[("EUR_GBP", dec!(0.85))]);

        let err = resolver().resolve(&cache, &c("USD"), &c("GBP")).unwrap_err();

        assert!(matches!(err, RateError::RateNotFound(_)));
    }

    #[test]
    fn test_non_positive_rate_is_integrity_error() {
        let cache = cache(&[("EUR_USD", dec!(0))]);
        let resolver = resolver();

        let direct = resolver.resolve(&cache, &c("EUR"), &c("USD")).unwrap_err();
        assert!(matches!(direct, RateError::StaleDataIntegrity { .. }));

        let inverse = resolver.resolve(&cache, &c("USD"), &c("EUR")).unwrap_err();
        assert!(matches!(inverse, RateError::StaleDataIntegrity { .. }));
    }

    #[test]
    fn test_non_numeric_rate_is_integrity_error() {
        let mut cache = cache(&[("EUR_USD", dec!(1.08))]);
        if let Some(entry) = cache.pairs.get_mut(&"EUR_USD".parse().unwrap()) {
            entry.rate = None;
        }

        let err = resolver().resolve(&cache, &c("EUR"), &c("USD")).unwrap_err();

        assert_eq!(err.error_code(), "STALE_DATA_INTEGRITY");
    }

    #[test]
    fn test_out_of_range_product_is_not_found() {
        let cache = cache(&[("AAA_USD", dec!(1000000000000000)), ("USD_BBB", dec!(1000000000000000))]);

        let err = resolver().resolve(&cache, &c("AAA"), &c("BBB")).unwrap_err();

        assert!(matches!(err, RateError::RateNotFound(ref pair) if pair.key() == "AAA_BBB"));
    }

    #[test]
    fn test_uninvertible_rate_is_integrity_error() {
        let cache = cache(&[("XXX_USD", Decimal::MAX)]);

        let err = resolver().resolve(&cache, &c("USD"), &c("XXX")).unwrap_err();

        assert!(matches!(err, RateError::StaleDataIntegrity { ref pair, .. } if pair.key() == "XXX_USD"));
    }
}
