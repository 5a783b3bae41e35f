//! Bittrex REST balance provider (v1.1 account API).

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
use super::signing::hmac_sha512_hex;
use super::{require_non_empty, BalanceProvider};

const BITTREX_API_BASE: &str = "https://bittrex.com";
const BALANCES_PATH: &str = "/api/v1.1/account/getbalances";

pub struct BittrexProvider {
    api_key: String,
    api_secret: SecretString,
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Option<Vec<BittrexBalance>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexBalance {
    currency: String,
    #[serde(default)]
    balance: serde_json::Value,
}

impl BittrexProvider {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        require_non_empty("bittrex", "api_key", &api_key)?;
        require_non_empty("bittrex", "api_secret", api_secret.expose_secret())?;

        Ok(Self {
            api_key,
            api_secret,
            base_url: BITTREX_API_BASE.to_string(),
            client: http::build_client("bittrex", DEFAULT_HTTP_TIMEOUT)?,
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
        self.client = http::build_client("bittrex", timeout)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn get_balances(&self) -> FetchResult<Vec<BittrexBalance>> {
        let query = http::form_encode(&[
            ("apikey", self.api_key.clone()),
            ("nonce", self.clock.nonce().to_string()),
        ]);
        let uri = format!("{}{}?{}", self.base_url, BALANCES_PATH, query);
        // Bittrex signs the complete request URI.
        let signature = hmac_sha512_hex(self.api_secret.expose_secret().as_bytes(), &uri)?;

        let response = self
            .client
            .get(&uri)
            .header("apisign", signature)
            .send()
            .await?;

        let (status, body) = http::read_body(response).await?;
        if !status.is_success() {
            return Err(http::status_error(status, &body));
        }

        let parsed: BalancesResponse = http::parse_json(&body)?;
        if !parsed.success {
            return Err(classify_message(parsed.message));
        }
        parsed
            .result
            .ok_or_else(|| FetchError::Parse("missing 'result' in getbalances response".to_string()))
    }
}

fn classify_message(message: String) -> FetchError {
    match message.as_str() {
        "APIKEY_INVALID" | "INVALID_SIGNATURE" | "INVALID_PERMISSION" | "APIKEY_NOT_PROVIDED" => {
            FetchError::Auth(message)
        }
        _ => FetchError::Exchange(message),
    }
}

/// Currencies with a `null` balance carry no amount and are skipped.
fn extract(balances: Vec<BittrexBalance>) -> Vec<BalanceEntry> {
    balances
        .into_iter()
        .filter(|b| !b.balance.is_null())
        .map(|b| BalanceEntry {
            amount: RawAmount::from_json(&b.balance),
            symbol: b.currency,
        })
        .collect()
}

#[async_trait::async_trait]
impl BalanceProvider for BittrexProvider {
    fn name(&self) -> &str {
        "bittrex"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let entries = extract(self.get_balances().await?);
        let balances = RawBalanceMap::collect(entries, Accumulation::Sum)?;
        debug!(provider = "bittrex", currencies = balances.len(), "fetched balances");
        Ok(balances)
    }
}
