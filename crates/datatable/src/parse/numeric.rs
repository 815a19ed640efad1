//! Numeric, boolean and year term parsing.
//!
//! Numeric terms are lenient: characters that cannot be part of the number
//! are stripped, and a term with nothing left parses as zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::TermError;

use super::date::digit_runs;

fn unparseable(column_type: &str, raw: &str) -> TermError {
    TermError::Unparseable {
        column_type: column_type.to_string(),
        raw: raw.to_string(),
    }
}

/// Parses an integer term from its digits alone.
pub fn integer(raw: &str) -> Result<i64, TermError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse().map_err(|_| unparseable("integer", raw))
}

/// Parses a decimal term from its digits and decimal point.
///
/// Parsing stops at a second decimal point, so `"1.2.3"` reads as `1.2`.
pub fn decimal(raw: &str) -> Result<Decimal, TermError> {
    let mut kept = String::new();
    let mut seen_point = false;
    for ch in raw.chars() {
        match ch {
            '0'..='9' => kept.push(ch),
            '.' if !seen_point => {
                seen_point = true;
                kept.push(ch);
            }
            '.' => break,
            _ => {}
        }
    }

    let kept = kept.trim_end_matches('.');
    if kept.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let kept = if kept.starts_with('.') {
        format!("0{}", kept)
    } else {
        kept.to_string()
    };

    Decimal::from_str(&kept).map_err(|_| unparseable("decimal", raw))
}

/// Parses a price term into integer cents, truncating fractional cents.
pub fn price_cents(raw: &str) -> Result<i64, TermError> {
    let amount = decimal(raw)?;
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| unparseable("price", raw))
}

/// Parses a boolean term: `1`, `true` and `yes` are true, anything else false.
pub fn boolean(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Parses a year term from its first run of digits.
pub fn year(raw: &str) -> Result<i32, TermError> {
    digit_runs(raw)
        .first()
        .and_then(|run| run.parse().ok())
        .ok_or_else(|| unparseable("year", raw))
}
