//! HTTP rate source clients.

mod coingecko;
mod exchangerate_api;
mod http;

use std::sync::Arc;

pub use coingecko::CoinGeckoClient;
pub use exchangerate_api::ExchangeRateApiClient;

use crate::config::RatesConfig;
use crate::error::RateResult;
use crate::source::RateSource;

/// Build every production source from configuration.
pub fn default_sources(config: &RatesConfig) -> RateResult<Vec<Arc<dyn RateSource>>> {
    Ok(vec![
        Arc::new(CoinGeckoClient::new(config)?),
        Arc::new(ExchangeRateApiClient::new(config)?),
    ])
}
