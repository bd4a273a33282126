//! CoinGecko simple-price client for crypto rates.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use valuta_common::{Currency, CurrencyPair};

use super::http::{build_client, get_json};
use crate::config::RatesConfig;
use crate::error::{FetchError, RateError, RateResult};
use crate::source::{RateBatch, RateSource};

/// `{ "bitcoin": { "usd": 59337.21 }, ... }`
type SimplePriceResponse = HashMap<String, HashMap<String, Decimal>>;

/// Fetches `CRYPTO_BASE` rates from CoinGecko.
pub struct CoinGeckoClient {
    client: Client,
    url: String,
    base: Currency,
    /// (code, coin id) in request order.
    coins: Vec<(Currency, String)>,
}

impl CoinGeckoClient {
    pub const NAME: &'static str = "CoinGecko";

    /// Create a client from configuration.
    pub fn new(config: &RatesConfig) -> RateResult<Self> {
        let coins = config
            .crypto_currencies
            .iter()
            .map(|code| {
                config
                    .crypto_id_map
                    .get(code.code())
                    .map(|id| (code.clone(), id.clone()))
                    .ok_or_else(|| {
                        RateError::Configuration(format!("No CoinGecko id configured for {}", code))
                    })
            })
            .collect::<RateResult<Vec<_>>>()?;

        Ok(Self {
            client: build_client(config.request_timeout)?,
            url: config.coingecko_url.clone(),
            base: config.base_currency.clone(),
            coins,
        })
    }

    fn parse_response(&self, data: &SimplePriceResponse) -> RateBatch {
        let vs = self.base.code().to_lowercase();

        self.coins
            .iter()
            .filter_map(|(code, id)| {
                let price = data.get(id)?.get(&vs)?;
                Some((CurrencyPair::new(code.clone(), self.base.clone()), *price))
            })
            .collect()
    }
}

#[async_trait]
impl RateSource for CoinGeckoClient {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip(self), fields(source = "CoinGecko"))]
    async fn fetch_rates(&self) -> Result<RateBatch, FetchError> {
        let ids = self
            .coins
            .iter()
            .map(|(_, id)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let vs = self.base.code().to_lowercase();

        let request = self
            .client
            .get(&self.url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", vs.as_str())]);

        let data: SimplePriceResponse = get_json(Self::NAME, request).await?;
        let batch = self.parse_response(&data);

        debug!(rates = batch.len(), "Parsed CoinGecko prices");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use mockito::{Matcher, Server};
    use rust_decimal_macros::dec;

    fn client_for(server: &Server) -> CoinGeckoClient {
        let config = RatesConfig {
            coingecko_url: format!("{}/api/v3/simple/price", server.url()),
            ..RatesConfig::default()
        };
        CoinGeckoClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_response_maps_ids_to_pairs() {
        let client = CoinGeckoClient::new(&RatesConfig::default()).unwrap();
        let data: SimplePriceResponse = serde_json::from_str(
            r#"{"bitcoin":{"usd":59337.21},"ethereum":{"usd":3720.0},"dogecoin":{"usd":0.1}}"#,
        )
        .unwrap();

        let batch = client.parse_response(&data);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[&"BTC_USD".parse().unwrap()], dec!(59337.21));
        assert_eq!(batch[&"ETH_USD".parse().unwrap()], dec!(3720));
    }

    #[test]
    fn test_parse_response_ignores_other_vs_currency() {
        let client = CoinGeckoClient::new(&RatesConfig::default()).unwrap();
        let data: SimplePriceResponse =
            serde_json::from_str(r#"{"bitcoin":{"eur":55000}}"#).unwrap();

        assert!(client.parse_response(&data).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rates_builds_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "bitcoin,ethereum,solana".into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bitcoin":{"usd":59337.21},"ethereum":{"usd":3720.5},"solana":{"usd":145.2}}"#)
            .create_async()
            .await;

        let batch = client_for(&server).fetch_rates().await.unwrap();

        mock.assert_async().await;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[&"SOL_USD".parse().unwrap()], dec!(145.2));
    }

    #[tokio::test]
    async fn test_fetch_rates_error_statuses() {
        for (status, kind) in [
            (429, FetchErrorKind::RateLimited),
            (401, FetchErrorKind::Unauthorized),
            (403, FetchErrorKind::Forbidden),
            (500, FetchErrorKind::Status),
        ] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("GET", "/api/v3/simple/price")
                .match_query(Matcher::Any)
                .with_status(status)
                .create_async()
                .await;

            let err = client_for(&server).fetch_rates().await.unwrap_err();

            assert_eq!(err.kind, kind, "status {}", status);
            assert_eq!(err.source_name, "CoinGecko");
        }
    }

    #[tokio::test]
    async fn test_fetch_rates_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"bitcoin":{"usd":"n/a"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_rates().await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::MalformedResponse);
    }
}
