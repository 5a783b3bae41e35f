use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{FetchError, FetchResult};

/// An amount as reported by an exchange.
///
/// Exchanges disagree on whether balances are JSON numbers or strings, so
/// text is kept untouched until normalization decides whether it parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Decimal(Decimal),
    Text(String),
}

impl RawAmount {
    pub fn text(value: impl Into<String>) -> Self {
        RawAmount::Text(value.into())
    }

    /// Convert a JSON value from an exchange response.
    ///
    /// Numbers are parsed eagerly; anything else is kept as text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => {
                let repr = n.to_string();
                match parse_decimal(&repr) {
                    Some(d) => RawAmount::Decimal(d),
                    None => RawAmount::Text(repr),
                }
            }
            serde_json::Value::String(s) => RawAmount::Text(s.clone()),
            other => RawAmount::Text(other.to_string()),
        }
    }

    /// The amount as a decimal, if it is one.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            RawAmount::Decimal(d) => Some(*d),
            RawAmount::Text(s) => parse_decimal(s),
        }
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        RawAmount::Decimal(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl std::fmt::Display for RawAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawAmount::Decimal(d) => write!(f, "{d}"),
            RawAmount::Text(s) => f.write_str(s),
        }
    }
}

/// Parse plain (`"0.25"`) or scientific (`"4e-8"`) decimal notation.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// One `{symbol, amount}` pair extracted from an exchange response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub symbol: String,
    pub amount: RawAmount,
}

impl BalanceEntry {
    pub fn new(symbol: impl Into<String>, amount: impl Into<RawAmount>) -> Self {
        Self {
            symbol: symbol.into(),
            amount: amount.into(),
        }
    }
}

/// How repeated symbols inside one response are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Add amounts (split wallet types reporting the same currency).
    Sum,
    /// Keep the first amount seen.
    FirstWins,
    /// Keep the last amount seen.
    LastWins,
}

/// Provider-native symbol to amount, exactly as one fetch reported it.
///
/// Entries that could not be summed because they are not numbers are kept
/// aside in [`RawBalanceMap::unparsed`] so the normalizer can report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawBalanceMap {
    entries: BTreeMap<String, RawAmount>,
    #[serde(skip)]
    unparsed: Vec<BalanceEntry>,
}

impl RawBalanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from extracted entries using the given accumulation rule.
    ///
    /// Fails only when a [`Accumulation::Sum`] total overflows.
    pub fn collect(
        entries: impl IntoIterator<Item = BalanceEntry>,
        rule: Accumulation,
    ) -> FetchResult<Self> {
        let mut map = Self::new();
        for entry in entries {
            match rule {
                Accumulation::Sum => map.add(entry.symbol, entry.amount)?,
                Accumulation::FirstWins => {
                    map.entries.entry(entry.symbol).or_insert(entry.amount);
                }
                Accumulation::LastWins => map.insert(entry.symbol, entry.amount),
            }
        }
        Ok(map)
    }

    /// Insert, replacing any previous amount for `symbol`.
    pub fn insert(&mut self, symbol: impl Into<String>, amount: impl Into<RawAmount>) {
        self.entries.insert(symbol.into(), amount.into());
    }

    /// Add `amount` to whatever is already recorded for `symbol`.
    ///
    /// Amounts that are not numbers never enter the sum; they are set aside
    /// in [`unparsed`](Self::unparsed). A sum that overflows is a parse error.
    pub fn add(
        &mut self,
        symbol: impl Into<String>,
        amount: impl Into<RawAmount>,
    ) -> FetchResult<()> {
        let symbol = symbol.into();
        let amount = amount.into();
        let Some(value) = amount.to_decimal() else {
            self.unparsed.push(BalanceEntry { symbol, amount });
            return Ok(());
        };

        match self.entries.entry(symbol) {
            Entry::Vacant(slot) => {
                slot.insert(amount);
            }
            Entry::Occupied(mut slot) => match slot.get().to_decimal() {
                Some(current) => {
                    let total = current.checked_add(value).ok_or_else(|| {
                        FetchError::Parse(format!("{} balance overflows", slot.key()))
                    })?;
                    slot.insert(RawAmount::Decimal(total));
                }
                None => {
                    let previous = slot.insert(amount);
                    self.unparsed.push(BalanceEntry {
                        symbol: slot.key().clone(),
                        amount: previous,
                    });
                }
            },
        }
        Ok(())
    }

    /// Entries left out of a sum because their amount is not a number.
    pub fn unparsed(&self) -> &[BalanceEntry] {
        &self.unparsed
    }

    pub fn get(&self, symbol: &str) -> Option<&RawAmount> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawAmount)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>, A: Into<RawAmount>> FromIterator<(S, A)> for RawBalanceMap {
    fn from_iter<T: IntoIterator<Item = (S, A)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (symbol, amount) in iter {
            map.insert(symbol, amount);
        }
        map
    }
}

/// Canonical symbol to total across every provider, ordered by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalBalanceMap {
    totals: BTreeMap<String, Decimal>,
}

impl CanonicalBalanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the total for `symbol` and return the new total.
    ///
    /// Returns `None`, leaving the total unchanged, if the sum would overflow.
    pub fn add(&mut self, symbol: impl Into<String>, amount: Decimal) -> Option<Decimal> {
        let total = self.totals.entry(symbol.into()).or_insert(Decimal::ZERO);
        *total = total.checked_add(amount)?;
        Some(*total)
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.totals.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Copy of this map without currencies whose total is zero.
    pub fn without_zero(&self) -> Self {
        Self {
            totals: self
                .totals
                .iter()
                .filter(|(_, v)| !v.is_zero())
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}
