mod balance;

pub use balance::{
    parse_decimal, Accumulation, BalanceEntry, CanonicalBalanceMap, RawAmount, RawBalanceMap,
};
