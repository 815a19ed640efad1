//! Date and datetime term parsing.
//!
//! The digit runs of a term select the period it names:
//!
//! | Runs | Example | Period |
//! |------|---------|--------|
//! | 1 | `2020` | the whole year |
//! | 2 | `2020-05` | the whole month |
//! | 3 | `2020-05-03` | the whole day |
//! | 4 | `2020-05-03 14` | the hour |
//! | 5 | `2020-05-03 14:30` | the minute |
//! | 6 | `2020-05-03 14:30:15` | a one second window |
//! | 7+ | `2020-05-03 14:30:15.250000` | the instant itself |
//!
//! Ranges are inclusive; period ends are the last millisecond of the period.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::TermError;

static DIGIT_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Granularity of a parsed date term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePrecision {
    /// A calendar year.
    Year,
    /// A calendar month.
    Month,
    /// A day.
    Day,
    /// An hour.
    Hour,
    /// A minute.
    Minute,
    /// A one second window.
    Second,
    /// A single instant.
    Point,
}

/// An inclusive date/time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// First instant of the period.
    pub start: NaiveDateTime,
    /// Last instant of the period (inclusive).
    pub end: NaiveDateTime,
    /// Period granularity.
    pub precision: DatePrecision,
}

impl DateRange {
    /// Returns the start as a date.
    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Returns the end as a date.
    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }
}

/// Extracts every run of digits from `raw`.
pub(crate) fn digit_runs(raw: &str) -> Vec<&str> {
    DIGIT_RUNS.find_iter(raw).map(|m| m.as_str()).collect()
}

/// Reads a fractional-second run as microseconds: `25` is 250 000.
fn fraction_micros(run: &str) -> u32 {
    run.chars()
        .chain(std::iter::repeat('0'))
        .take(6)
        .fold(0, |micros, digit| micros * 10 + digit.to_digit(10).unwrap_or(0))
}

/// Parses a date term into the inclusive range it names.
pub fn parse_range(raw: &str) -> Result<DateRange, TermError> {
    let invalid = || TermError::DateParse {
        raw: raw.to_string(),
    };

    let runs = digit_runs(raw);
    if runs.is_empty() {
        return Err(invalid());
    }

    let mut parts = [0u32; 7];
    // Month and day default to 1 when not given
    parts[1] = 1;
    parts[2] = 1;
    for (i, (slot, run)) in parts.iter_mut().zip(runs.iter()).enumerate() {
        *slot = if i == 6 {
            fraction_micros(run)
        } else {
            run.parse().map_err(|_| invalid())?
        };
    }

    let year = i32::try_from(parts[0]).map_err(|_| invalid())?;
    let start = NaiveDate::from_ymd_opt(year, parts[1], parts[2])
        .and_then(|d| d.and_hms_micro_opt(parts[3], parts[4], parts[5], parts[6]))
        .ok_or_else(invalid)?;

    let after = |at: NaiveDateTime, span: Duration| at.checked_add_signed(span).ok_or_else(invalid);
    let last_ms = Duration::milliseconds(1);
    let (end, precision) = match runs.len() {
        1 => {
            let next = NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?;
            (next - last_ms, DatePrecision::Year)
        }
        2 => {
            let next = start
                .checked_add_months(Months::new(1))
                .ok_or_else(invalid)?;
            (next - last_ms, DatePrecision::Month)
        }
        3 => (after(start, Duration::days(1))? - last_ms, DatePrecision::Day),
        4 => (after(start, Duration::hours(1))? - last_ms, DatePrecision::Hour),
        5 => (after(start, Duration::minutes(1))? - last_ms, DatePrecision::Minute),
        6 => (after(start, Duration::seconds(1))?, DatePrecision::Second),
        _ => (start, DatePrecision::Point),
    };

    Ok(DateRange {
        start,
        end,
        precision,
    })
}
