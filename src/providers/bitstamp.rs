//! Bitstamp REST balance provider.
//!
//! Bitstamp's balance endpoint is scoped to a trading pair, so the account
//! is queried once for `btceur` and once for `btcusd`. Both responses repeat
//! the same `<currency>_balance` fields; the first value seen wins.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::models::{Accumulation, BalanceEntry, RawAmount, RawBalanceMap};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::signing::hmac_sha256_hex;
use super::{require_non_empty, BalanceProvider};

const BITSTAMP_API_BASE: &str = "https://www.bitstamp.net";
const BALANCE_PAIRS: [&str; 2] = ["btceur", "btcusd"];

pub struct BitstampProvider {
    customer_id: String,
    api_key: String,
    api_secret: SecretString,
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl BitstampProvider {
    pub fn new(
        customer_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: SecretString,
    ) -> Result<Self, ConfigError> {
        let customer_id = customer_id.into();
        let api_key = api_key.into();
        require_non_empty("bitstamp", "api_key", &api_key)?;
        require_non_empty("bitstamp", "api_secret", api_secret.expose_secret())?;
        require_non_empty("bitstamp", "customer_id", &customer_id)?;

        Ok(Self {
            customer_id,
            api_key,
            api_secret,
            base_url: BITSTAMP_API_BASE.to_string(),
            client: http::build_client("bitstamp", DEFAULT_HTTP_TIMEOUT)?,
            clock: Arc::new(SystemClock),
        })
    }

    /// The customer id travels in the credential's `extra` field.
    pub fn from_credential(credential: &Credential) -> Result<Self, ConfigError> {
        let customer_id = credential.extra.clone().ok_or_else(|| ConfigError::MissingFields {
            provider: "bitstamp".to_string(),
            required: 4,
            found: credential.field_count(),
        })?;
        Self::new(
            customer_id,
            credential.api_key.clone(),
            credential.api_secret.clone(),
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.client = http::build_client("bitstamp", timeout)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn signature(&self, nonce: u64) -> FetchResult<String> {
        let message = format!("{nonce}{}{}", self.customer_id, self.api_key);
        Ok(hmac_sha256_hex(self.api_secret.expose_secret().as_bytes(), &message)?.to_uppercase())
    }

    async fn account_balance(
        &self,
        pair: &str,
    ) -> FetchResult<serde_json::Map<String, serde_json::Value>> {
        let nonce = self.clock.nonce();
        let form = http::form_encode(&[
            ("key", self.api_key.clone()),
            ("signature", self.signature(nonce)?),
            ("nonce", nonce.to_string()),
        ]);

        let response = self
            .client
            .post(format!("{}/api/v2/balance/{pair}/", self.base_url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await?;

        let (status, body) = http::read_body(response).await?;
        if !status.is_success() {
            return Err(http::status_error(status, &body));
        }

        let object: serde_json::Map<String, serde_json::Value> = http::parse_json(&body)?;
        if let Some(err) = rejection(&object) {
            return Err(err);
        }
        Ok(object)
    }
}

/// Bitstamp signals errors in-band as `{"status": "error", "reason": ...}`
/// or `{"error": ...}`.
fn rejection(object: &serde_json::Map<String, serde_json::Value>) -> Option<FetchError> {
    let is_error = object.get("status").and_then(|s| s.as_str()) == Some("error")
        || object.contains_key("error");
    if !is_error {
        return None;
    }

    let reason = object
        .get("reason")
        .or_else(|| object.get("error"))
        .map(|r| match r {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown error".to_string());

    let lowered = reason.to_lowercase();
    if lowered.contains("signature") || lowered.contains("api key") || lowered.contains("permission")
    {
        Some(FetchError::Auth(reason))
    } else {
        Some(FetchError::Exchange(reason))
    }
}

/// Pick `<currency>_balance` fields out of a balance response.
fn extract(object: &serde_json::Map<String, serde_json::Value>) -> Vec<BalanceEntry> {
    object
        .iter()
        .filter(|(key, _)| key.ends_with("balance"))
        .filter_map(|(key, value)| {
            let symbol = key.split('_').next()?;
            Some(BalanceEntry {
                symbol: symbol.to_string(),
                amount: RawAmount::from_json(value),
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl BalanceProvider for BitstampProvider {
    fn name(&self) -> &str {
        "bitstamp"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let mut entries = Vec::new();
        for pair in BALANCE_PAIRS {
            let object = self.account_balance(pair).await?;
            entries.extend(extract(&object));
        }

        let balances = RawBalanceMap::collect(entries, Accumulation::FirstWins)?;
        debug!(provider = "bitstamp", currencies = balances.len(), "fetched balances");
        Ok(balances)
    }
}
