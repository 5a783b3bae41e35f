//! Rendering of aggregated totals for the terminal and for machines.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::aggregate::AggregateOutcome;
use crate::error::ConfigError;
use crate::models::CanonicalBalanceMap;
use crate::normalize::{Normalized, ParseIssue};

/// Presentation settings for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub decimals: u32,
    pub hide_zero: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            decimals: 4,
            hide_zero: false,
        }
    }
}

/// A provider that could not be queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub provider: String,
    pub kind: &'static str,
    pub message: String,
}

/// Everything a run has to show for itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub totals: CanonicalBalanceMap,
    pub failures: Vec<FailureSummary>,
    pub issues: Vec<ParseIssue>,
    /// Key-file entries that never became a provider.
    pub skipped: Vec<String>,
}

impl Report {
    pub fn new(outcome: &AggregateOutcome, normalized: Normalized) -> Self {
        let failures = outcome
            .failures
            .iter()
            .map(|failure| FailureSummary {
                provider: failure.provider.clone(),
                kind: failure.error.kind(),
                message: failure.error.to_string(),
            })
            .collect();

        Self {
            totals: normalized.totals,
            failures,
            issues: normalized.issues,
            skipped: Vec::new(),
        }
    }

    pub fn with_skipped<'a>(mut self, rejected: impl IntoIterator<Item = &'a ConfigError>) -> Self {
        self.skipped = rejected.into_iter().map(ToString::to_string).collect();
        self
    }

    fn visible_totals(&self, options: ReportOptions) -> CanonicalBalanceMap {
        if options.hide_zero {
            self.totals.without_zero()
        } else {
            self.totals.clone()
        }
    }
}

/// Format an amount with exactly `dp` decimal places, rounding half away
/// from zero.
///
/// ```
/// use coinbook::report::format_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_amount(Decimal::new(15, 1), 4), "1.5000");
/// assert_eq!(format_amount(Decimal::new(123456, 5), 2), "1.23");
/// ```
pub fn format_amount(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let s = pad_fraction_to_dp(&rounded.abs().normalize().to_string(), dp);
    if negative {
        format!("-{s}")
    } else {
        s
    }
}

fn pad_fraction_to_dp(s: &str, dp: u32) -> String {
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if dp == 0 {
        return int_part.to_string();
    }

    let mut out = String::with_capacity(int_part.len() + 1 + dp as usize);
    out.push_str(int_part);
    out.push('.');
    out.extend(frac_part.chars().take(dp as usize));
    for _ in frac_part.len().min(dp as usize)..dp as usize {
        out.push('0');
    }
    out
}

/// Human-readable report, one `Currency: X, Value: N` line per currency.
pub fn render_text(report: &Report, options: ReportOptions) -> String {
    let mut out = String::from("Total:\n");
    for (symbol, value) in report.visible_totals(options).iter() {
        out.push_str(&format!(
            "Currency: {symbol}, Value: {}\n",
            format_amount(value, options.decimals)
        ));
    }

    if !report.failures.is_empty() {
        out.push_str("\nFailed providers:\n");
        for failure in &report.failures {
            out.push_str(&format!("  {}: {}\n", failure.provider, failure.message));
        }
    }

    if !report.issues.is_empty() {
        out.push_str("\nUnreadable balances (not counted):\n");
        for issue in &report.issues {
            out.push_str(&format!(
                "  {} {} = {:?} ({})\n",
                issue.provider, issue.symbol, issue.value, issue.reason
            ));
        }
    }

    if !report.skipped.is_empty() {
        out.push_str("\nSkipped key entries:\n");
        for entry in &report.skipped {
            out.push_str(&format!("  {entry}\n"));
        }
    }

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    totals: CanonicalBalanceMap,
    failures: &'a [FailureSummary],
    issues: &'a [ParseIssue],
    skipped: &'a [String],
}

/// Machine-readable report. Totals are exact decimal strings.
pub fn render_json(report: &Report, options: ReportOptions) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        totals: report.visible_totals(options),
        failures: &report.failures,
        issues: &report.issues,
        skipped: &report.skipped,
    })
}
