//! Kraken REST balance provider.
//!
//! Calls the private `Balance` endpoint. Kraken reports its legacy asset
//! codes (`XXBT`, `ZEUR`, ...) verbatim; mapping them to common symbols is
//! left to the normalizer.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::models::{Accumulation, BalanceEntry, RawAmount, RawBalanceMap};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::signing::{decode_base64_secret, kraken_signature};
use super::{require_non_empty, BalanceProvider};

const KRAKEN_API_BASE: &str = "https://api.kraken.com";
const BALANCE_PATH: &str = "/0/private/Balance";

pub struct KrakenProvider {
    api_key: String,
    api_secret: SecretString,
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<serde_json::Map<String, serde_json::Value>>,
}

impl KrakenProvider {
    /// Create a provider; the secret must be the base64 string Kraken issues.
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        require_non_empty("kraken", "api_key", &api_key)?;
        require_non_empty("kraken", "api_secret", api_secret.expose_secret())?;
        decode_base64_secret(api_secret.expose_secret()).map_err(|e| {
            ConfigError::InvalidField {
                provider: "kraken".to_string(),
                field: "api_secret",
                reason: format!("not base64: {e}"),
            }
        })?;

        Ok(Self {
            api_key,
            api_secret,
            base_url: KRAKEN_API_BASE.to_string(),
            client: http::build_client("kraken", DEFAULT_HTTP_TIMEOUT)?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn from_credential(credential: &Credential) -> Result<Self, ConfigError> {
        Self::new(credential.api_key.clone(), credential.api_secret.clone())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.client = http::build_client("kraken", timeout)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn query_balance(&self) -> FetchResult<BalanceResponse> {
        let secret = decode_base64_secret(self.api_secret.expose_secret())
            .map_err(|e| FetchError::Auth(format!("invalid API secret: {e}")))?;
        let nonce = self.clock.nonce();
        let post_data = http::form_encode(&[("nonce", nonce.to_string())]);
        let signature = kraken_signature(&secret, BALANCE_PATH, nonce, &post_data)?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, BALANCE_PATH))
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(post_data)
            .send()
            .await?;

        let (status, body) = http::read_body(response).await?;
        if !status.is_success() {
            return Err(http::status_error(status, &body));
        }
        http::parse_json(&body)
    }
}

/// Kraken reports failures in the `error` array even with HTTP 200.
fn classify_errors(errors: &[String]) -> FetchError {
    let joined = errors.join(", ");
    let is_auth = errors.iter().any(|e| {
        e.starts_with("EAPI:Invalid key")
            || e.starts_with("EAPI:Invalid signature")
            || e.starts_with("EGeneral:Permission denied")
    });
    if is_auth {
        FetchError::Auth(joined)
    } else if errors.iter().any(|e| e.starts_with("EService:")) {
        FetchError::Network(joined)
    } else {
        FetchError::Exchange(joined)
    }
}

fn extract(result: serde_json::Map<String, serde_json::Value>) -> Vec<BalanceEntry> {
    result
        .into_iter()
        .map(|(symbol, value)| BalanceEntry {
            symbol,
            amount: RawAmount::from_json(&value),
        })
        .collect()
}

#[async_trait::async_trait]
impl BalanceProvider for KrakenProvider {
    fn name(&self) -> &str {
        "kraken"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let response = self.query_balance().await?;
        if !response.error.is_empty() {
            return Err(classify_errors(&response.error));
        }
        let result = response
            .result
            .ok_or_else(|| FetchError::Parse("missing 'result' in Balance response".to_string()))?;

        let balances = RawBalanceMap::collect(extract(result), Accumulation::LastWins)?;
        debug!(provider = "kraken", currencies = balances.len(), "fetched balances");
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_base64_secret() {
        let err = KrakenProvider::new("key", SecretString::from("not base64!!".to_string())).err();
        assert!(matches!(
            err,
            Some(ConfigError::InvalidField { field: "api_secret", .. })
        ));
    }

    #[test]
    fn rejects_empty_key() {
        let err = KrakenProvider::new("", SecretString::from("c2VjcmV0".to_string())).err();
        assert!(matches!(err, Some(ConfigError::EmptyField { field: "api_key", .. })));
    }

    #[test]
    fn error_classification() {
        assert!(matches!(
            classify_errors(&["EAPI:Invalid key".to_string()]),
            FetchError::Auth(_)
        ));
        assert!(matches!(
            classify_errors(&["EService:Unavailable".to_string()]),
            FetchError::Network(_)
        ));
        assert!(matches!(
            classify_errors(&["EAPI:Invalid nonce".to_string()]),
            FetchError::Exchange(_)
        ));
    }
}
