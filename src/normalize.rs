//! Currency symbol unification and cross-provider totals.
//!
//! Symbols are trimmed, uppercased and passed through a fixed alias table
//! (mostly Kraken's legacy `X`/`Z` prefixed codes). Amounts are summed with
//! exact decimal arithmetic, so the totals do not depend on the order in
//! which providers or entries are visited.

use serde::Serialize;
use tracing::warn;

use crate::aggregate::ProviderBalances;
use crate::models::{CanonicalBalanceMap, RawAmount, RawBalanceMap};

/// Resolve a known non-canonical symbol. Expects trimmed uppercase input.
pub fn alias(symbol: &str) -> Option<&'static str> {
    let canonical = match symbol {
        "XXBT" | "XBT" => "BTC",
        "XETH" => "ETH",
        "XXRP" => "XRP",
        "XZEC" => "ZEC",
        "XXMR" => "XMR",
        "XLTC" => "LTC",
        "XXLM" => "XLM",
        "XETC" => "ETC",
        "XXDG" | "XDG" => "DOGE",
        "XREP" => "REP",
        "XMLN" => "MLN",
        "ZEUR" => "EUR",
        "ZUSD" => "USD",
        "ZGBP" => "GBP",
        "ZCAD" => "CAD",
        "ZJPY" => "JPY",
        "ZAUD" => "AUD",
        "ZCHF" => "CHF",
        _ => return None,
    };
    Some(canonical)
}

/// Canonical form of a provider-native symbol.
///
/// ```
/// use coinbook::normalize::canonical_symbol;
///
/// assert_eq!(canonical_symbol(" ZEUR"), "EUR");
/// assert_eq!(canonical_symbol("btc"), "BTC");
/// assert_eq!(canonical_symbol("XXBT"), "BTC");
/// ```
pub fn canonical_symbol(raw: &str) -> String {
    let symbol = raw.trim().to_uppercase();
    match alias(&symbol) {
        Some(canonical) => canonical.to_string(),
        None => symbol,
    }
}

/// An amount that could not be added to the totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseIssue {
    pub provider: String,
    pub symbol: String,
    pub value: String,
    pub reason: &'static str,
}

pub const NOT_A_NUMBER: &str = "not a number";
pub const TOTAL_OVERFLOW: &str = "total overflows";

/// Totals plus the entries that had to be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Normalized {
    pub totals: CanonicalBalanceMap,
    pub issues: Vec<ParseIssue>,
}

/// Sum every provider's balances per canonical symbol.
///
/// Unparsable amounts, and amounts that would overflow a total, are skipped
/// and reported in `issues`; they are not counted as zero. Currencies whose
/// total is zero are kept.
pub fn normalize(results: &[ProviderBalances]) -> Normalized {
    let mut normalized = Normalized::default();
    for result in results {
        accumulate(&mut normalized, &result.provider, &result.balances);
    }
    normalized
}

/// [`normalize`] for maps without provider attribution.
pub fn normalize_maps<'a>(maps: impl IntoIterator<Item = &'a RawBalanceMap>) -> Normalized {
    let mut normalized = Normalized::default();
    for (idx, map) in maps.into_iter().enumerate() {
        accumulate(&mut normalized, &format!("#{idx}"), map);
    }
    normalized
}

fn accumulate(normalized: &mut Normalized, provider: &str, balances: &RawBalanceMap) {
    for (symbol, amount) in balances.iter() {
        let reason = match amount.to_decimal() {
            Some(value) => match normalized.totals.add(canonical_symbol(symbol), value) {
                Some(_) => continue,
                None => TOTAL_OVERFLOW,
            },
            None => NOT_A_NUMBER,
        };
        record_issue(normalized, provider, symbol, amount, reason);
    }
    for entry in balances.unparsed() {
        record_issue(normalized, provider, &entry.symbol, &entry.amount, NOT_A_NUMBER);
    }
}

fn record_issue(
    normalized: &mut Normalized,
    provider: &str,
    symbol: &str,
    amount: &RawAmount,
    reason: &'static str,
) {
    warn!(
        provider = %provider,
        symbol = %symbol,
        value = %amount,
        reason,
        "skipping balance"
    );
    normalized.issues.push(ParseIssue {
        provider: provider.to_string(),
        symbol: symbol.to_string(),
        value: amount.to_string(),
        reason,
    });
}
