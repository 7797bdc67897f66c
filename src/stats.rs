//! Dashboard aggregation helpers shared by every repository backend.

use std::{collections::HashMap, str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use crate::models::StatusCount;

/// Statuses bucketed on the dashboard, in display order.
pub const LEAD_STATUSES: [&str; 7] = [
    "New",
    "Contacted",
    "Qualified",
    "Proposal",
    "Negotiation",
    "Won",
    "Lost",
];

pub const PROJECT_STATUSES: [&str; 5] = [
    "Pending",
    "In Progress",
    "Completed",
    "On Hold",
    "Cancelled",
];

/// A numeric-looking amount string. Postgres evaluates the same pattern in
/// [`AMOUNT_PATTERN_SQL`]; keep them in sync.
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("amount pattern is a valid regex")
});

pub const AMOUNT_PATTERN_SQL: &str = r"^-?[0-9]+(\.[0-9]+)?$";

/// Parses a stored amount. Returns `None` for anything that is not a plain
/// decimal number (exponents, separators, currency symbols, surrounding space).
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    if !AMOUNT_PATTERN.is_match(raw) {
        return None;
    }
    Decimal::from_str(raw).ok()
}

/// Sums amounts, counting non-numeric or missing values as zero. The total
/// saturates at the bounds of [`Decimal`] instead of overflowing.
pub fn sum_amounts<'a>(amounts: impl IntoIterator<Item = Option<&'a str>>) -> Decimal {
    amounts
        .into_iter()
        .filter_map(|raw| raw.and_then(parse_amount))
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Earnings minus expenses, saturating like [`sum_amounts`].
pub fn net_income(earnings: Decimal, expenses: Decimal) -> Decimal {
    earnings.saturating_sub(expenses)
}

/// Projects raw per-status counts onto a fixed status list. Every listed status
/// is present (zero when absent); statuses outside the list are dropped.
pub fn bucket_statuses(known: &[&str], counts: &HashMap<String, i64>) -> Vec<StatusCount> {
    known
        .iter()
        .map(|status| StatusCount {
            status: (*status).to_string(),
            count: counts.get(*status).copied().unwrap_or(0),
        })
        .collect()
}
