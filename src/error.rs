//! Error taxonomy for building and querying providers.
//!
//! Construction problems are [`ConfigError`]s and only ever drop the one
//! credential entry they belong to. Everything that can go wrong while a
//! provider is being queried is a [`FetchError`], recorded per provider by
//! the aggregator.

use thiserror::Error;

/// A credential entry that cannot be turned into a provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("{provider} needs at least {required} fields, got {found}")]
    MissingFields {
        provider: String,
        required: usize,
        found: usize,
    },

    #[error("{provider}: required field '{field}' is empty")]
    EmptyField {
        provider: String,
        field: &'static str,
    },

    #[error("{provider}: invalid {field}: {reason}")]
    InvalidField {
        provider: String,
        field: &'static str,
        reason: String,
    },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Attach the key-file line number this error came from.
    pub fn at_line(self, line: usize) -> Self {
        ConfigError::Line {
            line,
            source: Box::new(self),
        }
    }
}

/// Errors raised while fetching balances from one provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials were rejected by the exchange.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure (connect, TLS, socket closed, HTTP 5xx, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The exchange answered but refused the request for a non-auth reason.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Parse(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The provider is recognized but balance queries are not implemented.
    #[error("{0} balance queries are not supported")]
    Unsupported(String),
}

impl FetchError {
    /// Short machine-friendly name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Auth(_) => "auth",
            FetchError::Network(_) => "network",
            FetchError::Exchange(_) => "exchange",
            FetchError::Parse(_) => "parse",
            FetchError::Config(_) => "config",
            FetchError::Unsupported(_) => "unsupported",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FetchError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
