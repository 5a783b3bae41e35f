//! Shared REST plumbing for exchange transports.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, FetchError, FetchResult};

/// Default per-request timeout for REST exchanges.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client an adapter owns for its lifetime.
pub fn build_client(provider: &str, timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::InvalidField {
            provider: provider.to_string(),
            field: "http_client",
            reason: e.to_string(),
        })
}

/// Read a response body, keeping the status for exchange-specific handling.
pub async fn read_body(response: Response) -> FetchResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

/// Map a non-success HTTP status onto the fetch error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> FetchError {
    let message = format!("HTTP {status}: {}", truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(message),
        s if s.is_server_error() => FetchError::Network(message),
        _ => FetchError::Exchange(message),
    }
}

/// Deserialize a JSON body.
pub fn parse_json<T: DeserializeOwned>(body: &str) -> FetchResult<T> {
    serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))
}

/// `application/x-www-form-urlencoded` body or query string from pairs.
pub fn form_encode(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
