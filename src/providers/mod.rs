//! Exchange balance providers.
//!
//! Every exchange adapter implements [`BalanceProvider`]. Adapters are built
//! the same way: a raw call through the exchange transport, an extraction
//! step that turns the response into [`BalanceEntry`](crate::models::BalanceEntry)
//! items, and an [`Accumulation`](crate::models::Accumulation) rule that folds
//! repeated symbols into one [`RawBalanceMap`].

pub mod binance;
pub mod bitfinex;
pub mod bitstamp;
pub mod bittrex;
pub mod coinbase;
pub mod dummy;
pub mod http;
pub mod kraken;
pub mod session;
mod signing;

pub use binance::BinanceProvider;
pub use bitfinex::{BitfinexProvider, BitfinexWsConnector};
pub use bitstamp::BitstampProvider;
pub use bittrex::BittrexProvider;
pub use coinbase::CoinbaseProvider;
pub use dummy::DummyProvider;
pub use kraken::KrakenProvider;
pub use session::{LiveSession, SessionConnector, SessionState, WalletRow, WalletSession};

use crate::error::{ConfigError, FetchResult};
use crate::models::RawBalanceMap;

/// Uniform balance-fetch capability over one exchange account.
#[async_trait::async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Provider identifier as used in the key file (e.g. "kraken").
    fn name(&self) -> &str;

    /// Query the account once and return its native balances.
    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap>;
}

/// Reject empty credential fields at construction time.
pub(crate) fn require_non_empty(
    provider: &str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField {
            provider: provider.to_string(),
            field,
        });
    }
    Ok(())
}
