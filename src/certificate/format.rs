//! Display formatting shared by the template filters and the validator.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

pub const INR_SYMBOL: &str = "₹";

/// Format an amount in rupees with Indian digit grouping, e.g. "₹12,34,567.89".
///
/// The value is quantized to two decimals (round-half-up) so the fractional part is
/// always exactly two digits.
pub fn format_inr(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);

    let text = rounded.abs().to_string();
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    format!("{sign}{INR_SYMBOL}{}.{frac}", group_indian(whole))
}

/// Group an integer digit string: last three digits, then pairs ("1234567" -> "12,34,567").
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Day-month-year with abbreviated month, e.g. "15 Jan 2024".
pub fn format_date_dmy(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Numeric day-month-year, e.g. "15-01-2024".
pub fn format_date_numeric(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Trim and collapse inner whitespace runs to single spaces.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
