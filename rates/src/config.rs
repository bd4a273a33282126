//! Rate engine configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use valuta_common::time::constants;
use valuta_common::{Currency, DurationExt};

/// Configuration for the rate engine and its sources.
#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// Base currency every source quotes against; also the triangulation hub.
    pub base_currency: Currency,
    /// Maximum cache age before a query forces a refresh.
    pub ttl_seconds: u64,
    /// Background refresh interval.
    pub refresh_interval: Duration,
    /// Floor for the background refresh interval.
    pub min_refresh_interval: Duration,
    /// Per-request HTTP timeout for each source.
    pub request_timeout: Duration,
    /// CoinGecko simple-price endpoint.
    pub coingecko_url: String,
    /// ExchangeRate-API v6 base URL.
    pub exchangerate_api_url: String,
    /// ExchangeRate-API key.
    pub exchangerate_api_key: Option<String>,
    /// Fiat codes requested from ExchangeRate-API.
    pub fiat_currencies: Vec<Currency>,
    /// Crypto codes requested from CoinGecko.
    pub crypto_currencies: Vec<Currency>,
    /// Crypto code to CoinGecko coin id.
    pub crypto_id_map: BTreeMap<String, String>,
    /// Latest-rate cache file.
    pub rates_file: PathBuf,
    /// Append-only history file.
    pub history_file: PathBuf,
}

impl Default for RatesConfig {
    fn default() -> Self {
        let crypto_id_map = [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
            .into_iter()
            .map(|(code, id)| (code.to_string(), id.to_string()))
            .collect();

        Self {
            base_currency: Currency::usd(),
            ttl_seconds: constants::default_rates_ttl().num_seconds() as u64,
            refresh_interval: constants::default_refresh_interval().as_std(),
            min_refresh_interval: constants::min_refresh_interval().as_std(),
            request_timeout: constants::request_timeout().as_std(),
            coingecko_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            exchangerate_api_url: "https://v6.exchangerate-api.com/v6".to_string(),
            exchangerate_api_key: None,
            fiat_currencies: ["EUR", "GBP", "RUB"].into_iter().map(Currency::new).collect(),
            crypto_currencies: ["BTC", "ETH", "SOL"].into_iter().map(Currency::new).collect(),
            crypto_id_map,
            rates_file: PathBuf::from("data/rates.json"),
            history_file: PathBuf::from("data/exchange_rates.json"),
        }
    }
}

impl RatesConfig {
    /// Point both data files into `dir`.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.rates_file = dir.join("rates.json");
        self.history_file = dir.join("exchange_rates.json");
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("VALUTA_DATA_DIR") {
            config = config.with_data_dir(dir);
        }

        if let Ok(base) = std::env::var("VALUTA_BASE_CURRENCY") {
            config.base_currency = Currency::new(base);
        }

        if let Some(ttl) = env_u64("VALUTA_RATES_TTL_SECONDS") {
            config.ttl_seconds = ttl;
        }

        if let Some(secs) = env_u64("VALUTA_REFRESH_INTERVAL_SECONDS") {
            config.refresh_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = env_u64("VALUTA_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(url) = std::env::var("VALUTA_COINGECKO_URL") {
            config.coingecko_url = url;
        }

        if let Ok(url) = std::env::var("VALUTA_EXCHANGERATE_API_URL") {
            config.exchangerate_api_url = url;
        }

        if let Ok(key) = std::env::var("EXCHANGERATE_API_KEY") {
            if !key.trim().is_empty() {
                config.exchangerate_api_key = Some(key.trim().to_string());
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if Currency::parse(self.base_currency.code()).is_err() {
            return Err(format!("Invalid base currency '{}'", self.base_currency));
        }

        if self.ttl_seconds == 0 {
            return Err("Rates TTL cannot be 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if let Some(code) = self
            .crypto_currencies
            .iter()
            .find(|c| !self.crypto_id_map.contains_key(c.code()))
        {
            return Err(format!("No CoinGecko id configured for {}", code));
        }

        if self.rates_file == self.history_file {
            return Err("Rates cache and history must use different files".to_string());
        }

        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
