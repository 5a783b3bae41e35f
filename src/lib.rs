//! Aggregate cryptocurrency balances across exchange accounts.
//!
//! Credentials from a key file become [`providers::BalanceProvider`]s via the
//! [`registry`]; [`aggregate::aggregate`] queries them concurrently and
//! [`normalize::normalize`] folds the results into one total per currency.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod error;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod report;

pub use aggregate::{aggregate, AggregateOutcome};
pub use error::{ConfigError, FetchError, FetchResult};
pub use normalize::{normalize, Normalized};
pub use registry::{ProviderOptions, ProviderRegistry};
