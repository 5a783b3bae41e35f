//! Query every provider once and collect results without letting one
//! failure affect the others.

use futures::future::join_all;
use tracing::{error, info};

use crate::error::FetchError;
use crate::models::RawBalanceMap;
use crate::providers::BalanceProvider;

/// Balances one provider reported.
#[derive(Debug)]
pub struct ProviderBalances {
    pub provider: String,
    pub balances: RawBalanceMap,
}

/// A provider whose fetch failed.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: FetchError,
}

/// Everything one aggregation run produced, in provider order.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub balances: Vec<ProviderBalances>,
    pub failures: Vec<ProviderFailure>,
}

impl AggregateOutcome {
    /// The successful raw maps, in provider order.
    pub fn raw_maps(&self) -> impl Iterator<Item = &RawBalanceMap> {
        self.balances.iter().map(|b| &b.balances)
    }
}

/// Fetch balances from all providers concurrently.
///
/// Every provider is queried exactly once with no retries. All fetches are
/// awaited before this returns; results keep the order of `providers`.
pub async fn aggregate(providers: &[Box<dyn BalanceProvider>]) -> AggregateOutcome {
    let fetches = providers.iter().map(|provider| async move {
        let result = provider.fetch_balances().await;
        (provider.name().to_string(), result)
    });

    let mut outcome = AggregateOutcome::default();
    for (provider, result) in join_all(fetches).await {
        match result {
            Ok(balances) => {
                info!(
                    provider = %provider,
                    currencies = balances.len(),
                    "queried provider"
                );
                outcome.balances.push(ProviderBalances { provider, balances });
            }
            Err(err) => {
                error!(
                    provider = %provider,
                    kind = err.kind(),
                    error = %err,
                    "error while querying provider"
                );
                outcome.failures.push(ProviderFailure {
                    provider,
                    error: err,
                });
            }
        }
    }
    outcome
}
