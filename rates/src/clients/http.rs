//! Shared request plumbing for the HTTP sources.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{FetchError, FetchErrorKind, RateError, RateResult};

pub(crate) fn build_client(timeout: Duration) -> RateResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("valutatrade-hub/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RateError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success status to a fetch error; `None` for success.
pub(crate) fn classify_status(source: &str, status: StatusCode) -> Option<FetchError> {
    let (kind, reason) = match status {
        s if s.is_success() => return None,
        StatusCode::TOO_MANY_REQUESTS => (
            FetchErrorKind::RateLimited,
            "Rate limit exceeded (429). Please try again later.".to_string(),
        ),
        StatusCode::UNAUTHORIZED => (
            FetchErrorKind::Unauthorized,
            "Unauthorized (401). Check your API key.".to_string(),
        ),
        StatusCode::FORBIDDEN => (
            FetchErrorKind::Forbidden,
            "Access forbidden (403). API key may be invalid.".to_string(),
        ),
        other => (FetchErrorKind::Status, format!("HTTP error {}", other)),
    };

    Some(FetchError::new(source, kind, reason))
}

/// Send `request` and decode the JSON body.
pub(crate) async fn get_json<T>(source: &str, request: RequestBuilder) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        FetchError::new(source, FetchErrorKind::Network, reason)
    })?;

    let status = response.status();
    debug!(source, status = %status, "Rate source responded");

    if let Some(err) = classify_status(source, status) {
        return Err(err);
    }

    let body = response.text().await.map_err(|e| {
        FetchError::new(source, FetchErrorKind::Network, format!("failed to read body: {}", e))
    })?;

    serde_json::from_str(&body).map_err(|e| {
        FetchError::new(
            source,
            FetchErrorKind::MalformedResponse,
            format!("response parsing failed: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use mockito::Server;

    async fn fetch(server: &Server, path: &str) -> Result<HashMap<String, u32>, FetchError> {
        let client = build_client(Duration::from_secs(5)).unwrap();
        get_json("test", client.get(format!("{}{}", server.url(), path))).await
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status("s", StatusCode::OK).is_none());

        let limited = classify_status("s", StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert_eq!(limited.kind, FetchErrorKind::RateLimited);

        let unauthorized = classify_status("s", StatusCode::UNAUTHORIZED).unwrap();
        assert_eq!(unauthorized.kind, FetchErrorKind::Unauthorized);

        let forbidden = classify_status("s", StatusCode::FORBIDDEN).unwrap();
        assert_eq!(forbidden.kind, FetchErrorKind::Forbidden);

        let server = classify_status("s", StatusCode::BAD_GATEWAY).unwrap();
        assert_eq!(server.kind, FetchErrorKind::Status);
        assert!(server.reason.contains("502"));
    }

    #[tokio::test]
    async fn test_get_json_decodes_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"a":1,"b":2}"#)
            .create_async()
            .await;

        let data = fetch(&server, "/ok").await.unwrap();

        assert_eq!(data["b"], 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_maps_error_statuses() {
        let mut server = Server::new_async().await;
        let cases = [
            (429, FetchErrorKind::RateLimited),
            (401, FetchErrorKind::Unauthorized),
            (403, FetchErrorKind::Forbidden),
            (500, FetchErrorKind::Status),
        ];

        for (status, kind) in cases {
            let path = format!("/status/{}", status);
            let _mock = server
                .mock("GET", path.as_str())
                .with_status(status)
                .with_body("{}")
                .create_async()
                .await;

            let err = fetch(&server, &path).await.unwrap_err();

            assert_eq!(err.kind, kind, "status {}", status);
            assert_eq!(err.source_name, "test");
        }
    }

    #[tokio::test]
    async fn test_get_json_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = fetch(&server, "/broken").await.unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::MalformedResponse);
        assert!(err.reason.contains("parsing failed"));
    }

    #[tokio::test]
    async fn test_get_json_connection_refused() {
        let client = build_client(Duration::from_secs(5)).unwrap();

        let err = get_json::<HashMap<String, u32>>("test", client.get("http://127.0.0.1:1/"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Network);
        assert!(err.is_transient());
    }
}
