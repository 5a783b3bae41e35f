//! Coinbase placeholder.
//!
//! Coinbase credentials are accepted so key files stay portable, but balance
//! queries are not implemented and every fetch reports `Unsupported`.

use crate::credentials::Credential;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::models::RawBalanceMap;

use super::{require_non_empty, BalanceProvider};

pub struct CoinbaseProvider;

impl CoinbaseProvider {
    /// Validates the key so a malformed entry is still reported at build time.
    pub fn from_credential(credential: &Credential) -> Result<Self, ConfigError> {
        require_non_empty("coinbase", "api_key", &credential.api_key)?;
        Ok(Self)
    }
}

#[async_trait::async_trait]
impl BalanceProvider for CoinbaseProvider {
    fn name(&self) -> &str {
        "coinbase"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        Err(FetchError::Unsupported("coinbase".to_string()))
    }
}
