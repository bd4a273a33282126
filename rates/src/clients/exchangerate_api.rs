//! ExchangeRate-API v6 client for fiat rates.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};
use valuta_common::{Currency, CurrencyPair};

use super::http::{build_client, get_json};
use crate::config::RatesConfig;
use crate::error::{FetchError, FetchErrorKind, RateResult};
use crate::source::{RateBatch, RateSource};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, Decimal>,
}

/// Fetches fiat rates quoted as `1 BASE = x FIAT`.
///
/// The provider quotes from the base side, so pairs are emitted as `BASE_FIAT`
/// and the resolver's inverse step answers `FIAT -> BASE`.
pub struct ExchangeRateApiClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    base: Currency,
    fiat: Vec<Currency>,
}

impl ExchangeRateApiClient {
    pub const NAME: &'static str = "ExchangeRate-API";

    /// Create a client from configuration.
    pub fn new(config: &RatesConfig) -> RateResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            url: config.exchangerate_api_url.trim_end_matches('/').to_string(),
            api_key: config.exchangerate_api_key.clone(),
            base: config.base_currency.clone(),
            fiat: config.fiat_currencies.clone(),
        })
    }

    fn parse_response(&self, data: LatestResponse) -> Result<RateBatch, FetchError> {
        if data.result != "success" {
            let error_type = data.error_type.unwrap_or_else(|| "unknown".to_string());
            let kind = match error_type.as_str() {
                "invalid-key" | "inactive-account" => FetchErrorKind::Unauthorized,
                "quota-reached" => FetchErrorKind::RateLimited,
                _ => FetchErrorKind::MalformedResponse,
            };
            return Err(FetchError::new(
                Self::NAME,
                kind,
                format!("provider returned error: {}", error_type),
            ));
        }

        Ok(self
            .fiat
            .iter()
            .filter_map(|code| {
                let rate = data.conversion_rates.get(code.code())?;
                Some((CurrencyPair::new(self.base.clone(), code.clone()), *rate))
            })
            .collect())
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiClient {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip(self), fields(source = "ExchangeRate-API"))]
    async fn fetch_rates(&self) -> Result<RateBatch, FetchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FetchError::new(
                Self::NAME,
                FetchErrorKind::Configuration,
                "EXCHANGERATE_API_KEY is not set",
            )
        })?;

        let url = format!("{}/{}/latest/{}", self.url, api_key, self.base);
        let data: LatestResponse = get_json(Self::NAME, self.client.get(&url)).await?;
        let batch = self.parse_response(data)?;

        debug!(rates = batch.len(), "Parsed ExchangeRate-API rates");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use rust_decimal_macros::dec;

    const LATEST_PATH: &str = "/v6/test-key/latest/USD";

    fn client() -> ExchangeRateApiClient {
        ExchangeRateApiClient::new(&RatesConfig::default()).unwrap()
    }

    fn client_for(server: &Server) -> ExchangeRateApiClient {
        let config = RatesConfig {
            exchangerate_api_url: format!("{}/v6/", server.url()),
            exchangerate_api_key: Some("test-key".to_string()),
            ..RatesConfig::default()
        };
        ExchangeRateApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_success() {
        let data: LatestResponse = serde_json::from_str(
            r#"{"result":"success","base_code":"USD","conversion_rates":{"USD":1,"EUR":0.9259,"GBP":0.79,"JPY":150.1}}"#,
        )
        .unwrap();

        let batch = client().parse_response(data).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[&"USD_EUR".parse().unwrap()], dec!(0.9259));
        assert_eq!(batch[&"USD_GBP".parse().unwrap()], dec!(0.79));
    }

    #[test]
    fn test_parse_provider_error() {
        let data: LatestResponse =
            serde_json::from_str(r#"{"result":"error","error-type":"invalid-key"}"#).unwrap();

        let err = client().parse_response(data).unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Unauthorized);
        assert!(err.reason.contains("invalid-key"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let err = client().fetch_rates().await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Configuration);
        assert_eq!(err.source_name, "ExchangeRate-API");
    }

    #[tokio::test]
    async fn test_fetch_rates_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"success","conversion_rates":{"EUR":0.9259,"GBP":0.79,"RUB":92.5}}"#)
            .create_async()
            .await;

        let batch = client_for(&server).fetch_rates().await.unwrap();

        mock.assert_async().await;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[&"USD_RUB".parse().unwrap()], dec!(92.5));
    }

    #[tokio::test]
    async fn test_fetch_rates_error_statuses() {
        for (status, kind) in [
            (401, FetchErrorKind::Unauthorized),
            (403, FetchErrorKind::Forbidden),
            (429, FetchErrorKind::RateLimited),
            (500, FetchErrorKind::Status),
        ] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("GET", LATEST_PATH)
                .with_status(status)
                .create_async()
                .await;

            let err = client_for(&server).fetch_rates().await.unwrap_err();

            assert_eq!(err.kind, kind, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_fetch_rates_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server).fetch_rates().await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_fetch_rates_quota_reached() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_body(r#"{"result":"error","error-type":"quota-reached"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_rates().await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::RateLimited);
    }
}
