//! Provider registry.
//!
//! Turns key-file credentials into ready-to-query providers. Dispatch is by
//! exact (case-sensitive) provider name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;
use crate::error::ConfigError;
use crate::providers::http::DEFAULT_HTTP_TIMEOUT;
use crate::providers::session::DEFAULT_SESSION_TIMEOUT;
use crate::providers::{
    BalanceProvider, BinanceProvider, BitfinexProvider, BitfinexWsConnector, BitstampProvider,
    BittrexProvider, CoinbaseProvider, DummyProvider, KrakenProvider,
};

/// Every provider the registry knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Bitstamp,
    Kraken,
    Bitfinex,
    Bittrex,
    Binance,
    Coinbase,
    Dummy,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Bitstamp,
        ProviderKind::Kraken,
        ProviderKind::Bitfinex,
        ProviderKind::Bittrex,
        ProviderKind::Binance,
        ProviderKind::Coinbase,
        ProviderKind::Dummy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Bitstamp => "bitstamp",
            ProviderKind::Kraken => "kraken",
            ProviderKind::Bitfinex => "bitfinex",
            ProviderKind::Bittrex => "bittrex",
            ProviderKind::Binance => "binance",
            ProviderKind::Coinbase => "coinbase",
            ProviderKind::Dummy => "dummy",
        }
    }

    /// Number of key-file fields an entry for this provider needs.
    pub fn required_fields(self) -> usize {
        match self {
            ProviderKind::Bitstamp => 4,
            _ => 3,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where each exchange transport connects to.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub kraken: Option<String>,
    pub bitstamp: Option<String>,
    pub bittrex: Option<String>,
    pub binance: Option<String>,
    pub bitfinex_ws: Option<String>,
}

/// Settings applied to every provider the registry builds.
#[derive(Clone)]
pub struct ProviderOptions {
    /// Deadline for live-session providers to deliver data.
    pub session_timeout: Duration,
    /// Per-request timeout for REST providers.
    pub http_timeout: Duration,
    /// Base URL overrides; `None` uses the exchange's production endpoint.
    pub endpoints: Endpoints,
    pub clock: Arc<dyn Clock>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            endpoints: Endpoints::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Builds providers from credentials.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    options: ProviderOptions,
}

/// Result of building a whole key file worth of providers.
pub struct BuiltProviders {
    pub providers: Vec<Box<dyn BalanceProvider>>,
    pub rejected: Vec<ConfigError>,
}

impl ProviderRegistry {
    pub fn new(options: ProviderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Build the provider for one credential.
    pub fn build(&self, credential: &Credential) -> Result<Box<dyn BalanceProvider>, ConfigError> {
        let kind: ProviderKind = credential.provider_name.parse()?;

        if credential.field_count() < kind.required_fields() {
            return Err(ConfigError::MissingFields {
                provider: kind.to_string(),
                required: kind.required_fields(),
                found: credential.field_count(),
            });
        }

        let opts = &self.options;
        let provider: Box<dyn BalanceProvider> = match kind {
            ProviderKind::Dummy => Box::new(DummyProvider::new()),
            ProviderKind::Coinbase => Box::new(CoinbaseProvider::from_credential(credential)?),
            ProviderKind::Kraken => {
                let mut provider = KrakenProvider::from_credential(credential)?
                    .with_timeout(opts.http_timeout)?
                    .with_clock(opts.clock.clone());
                if let Some(url) = &opts.endpoints.kraken {
                    provider = provider.with_base_url(url.clone());
                }
                Box::new(provider)
            }
            ProviderKind::Bitstamp => {
                let mut provider = BitstampProvider::from_credential(credential)?
                    .with_timeout(opts.http_timeout)?
                    .with_clock(opts.clock.clone());
                if let Some(url) = &opts.endpoints.bitstamp {
                    provider = provider.with_base_url(url.clone());
                }
                Box::new(provider)
            }
            ProviderKind::Bittrex => {
                let mut provider = BittrexProvider::from_credential(credential)?
                    .with_timeout(opts.http_timeout)?
                    .with_clock(opts.clock.clone());
                if let Some(url) = &opts.endpoints.bittrex {
                    provider = provider.with_base_url(url.clone());
                }
                Box::new(provider)
            }
            ProviderKind::Binance => {
                let mut provider = BinanceProvider::from_credential(credential)?
                    .with_timeout(opts.http_timeout)?
                    .with_clock(opts.clock.clone());
                if let Some(url) = &opts.endpoints.binance {
                    provider = provider.with_base_url(url.clone());
                }
                Box::new(provider)
            }
            ProviderKind::Bitfinex => {
                let mut connector = BitfinexWsConnector::new(
                    credential.api_key.clone(),
                    credential.api_secret.clone(),
                )?
                .with_clock(opts.clock.clone());
                if let Some(url) = &opts.endpoints.bitfinex_ws {
                    connector = connector.with_url(url.clone());
                }
                Box::new(
                    BitfinexProvider::new(Arc::new(connector)).with_timeout(opts.session_timeout),
                )
            }
        };

        Ok(provider)
    }

    /// Build providers for every credential, skipping the ones that fail.
    ///
    /// Failed entries are logged and returned in `rejected`; they never stop
    /// later entries from being built.
    pub fn build_all<'a>(
        &self,
        credentials: impl IntoIterator<Item = &'a Credential>,
    ) -> BuiltProviders {
        let mut providers = Vec::new();
        let mut rejected = Vec::new();

        for credential in credentials {
            match self.build(credential) {
                Ok(provider) => providers.push(provider),
                Err(err) => {
                    warn!(
                        provider = %credential.provider_name,
                        error = %err,
                        "skipping credential entry"
                    );
                    rejected.push(err);
                }
            }
        }

        BuiltProviders {
            providers,
            rejected,
        }
    }
}
