//! Offline provider returning fixed balances, for tests and dry runs.

use rust_decimal::Decimal;

use crate::error::FetchResult;
use crate::models::{Accumulation, BalanceEntry, RawBalanceMap};

use super::BalanceProvider;

pub struct DummyProvider {
    entries: Vec<BalanceEntry>,
}

impl DummyProvider {
    /// The stock dummy account: 1.1 BTC and 9.6 ETH.
    pub fn new() -> Self {
        Self::with_entries(vec![
            BalanceEntry::new("BTC", Decimal::new(11, 1)),
            BalanceEntry::new("ETH", Decimal::new(96, 1)),
        ])
    }

    pub fn with_entries(entries: Vec<BalanceEntry>) -> Self {
        Self { entries }
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BalanceProvider for DummyProvider {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn fetch_balances(&self) -> FetchResult<RawBalanceMap> {
        RawBalanceMap::collect(self.entries.iter().cloned(), Accumulation::LastWins)
    }
}
