//! Binance spot account balance provider.
//!
//! Only free balances above zero are reported. Binance lists every asset it
//! supports in the account response, most of them empty.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::models::{Accumulation, BalanceEntry, RawAmount, RawBalanceMap};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::signing::hmac_sha256_hex;
use super::{require_non_empty, BalanceProvider};

const BINANCE_API_BASE: &str = "https://api.binance.com";
const ACCOUNT_PATH: &str = "/api/v3/account";

/// Error codes Binance uses for rejected keys or signatures.
const AUTH_ERROR_CODES: [i64; 3] = [-1022, -2014, -2015];

pub struct BinanceProvider {
    api_key: String,
    api_secret: SecretString,
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

impl BinanceProvider {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        require_non_empty("binance", "api_key", &api_key)?;
        require_non_empty("binance", "api_secret", api_secret.expose_secret())?;

        Ok(Self {
            api_key,
            api_secret,
            base_url: BINANCE_API_BASE.to_string(),
            client: http::build_client("binance", DEFAULT_HTTP_TIMEOUT)?,
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
        self.client = http::build_client("binance", timeout)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn get_account(&self) -> FetchResult<AccountResponse> {
        let query = http::form_encode(&[("timestamp", self.clock.timestamp_millis().to_string())]);
        let signature = hmac_sha256_hex(self.api_secret.expose_secret().as_bytes(), &query)?;

        let response = self
            .client
            .get(format!(
                "{}{}?{}&signature={}",
                self.base_url, ACCOUNT_PATH, query, signature
            ))
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let (status, body) = http::read_body(response).await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        http::parse_json(&body)
    }
}

fn api_error(status: StatusCode, body: &str) -> FetchError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if AUTH_ERROR_CODES.contains(&err.code) => {
            FetchError::Auth(format!("[{}] {}", err.code, err.msg))
        }
        _ => http::status_error(status, body),
    }
}

/// Keep assets whose free balance is above zero.
///
/// A `free` value that does not parse is kept so normalization reports it.
fn extract(balances: Vec<AssetBalance>) -> Vec<BalanceEntry> {
    balances
        .into_iter()
        .filter_map(|b| {
            let amount = RawAmount::from_json(&b.free);
            match amount.to_decimal() {
                Some(value) if value <= Decimal::ZERO => None,
                _ => Some(BalanceEntry {
                    symbol: b.asset,
                    amount,
                }),
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl BalanceProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        let account = self.get_account().await?;
        let balances = RawBalanceMap::collect(extract(account.balances), Accumulation::LastWins)?;
        debug!(provider = "binance", currencies = balances.len(), "fetched balances");
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_balances_are_filtered() {
        let parsed: AccountResponse = serde_json::from_str(
            r#"{"balances": [
                {"asset": "BTC", "free": "0.00000000", "locked": "0.00000000"},
                {"asset": "BNB", "free": "1.25000000", "locked": "0.00000000"},
                {"asset": "ODD", "free": "???", "locked": "0"}
            ]}"#,
        )
        .unwrap();
        let entries = extract(parsed.balances);
        let symbols: Vec<_> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BNB", "ODD"]);
    }

    #[test]
    fn auth_codes_map_to_auth() {
        let err = api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}"#,
        );
        assert!(matches!(err, FetchError::Auth(_)));

        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"code": -1022, "msg": "Signature for this request is not valid."}"#,
        );
        assert!(matches!(err, FetchError::Auth(_)));

        let err = api_error(StatusCode::BAD_REQUEST, r#"{"code": -1100, "msg": "bad"}"#);
        assert!(matches!(err, FetchError::Exchange(_)));
    }
}
