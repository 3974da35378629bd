//! Calendar arithmetic shared by the schedule builders and the loan book

use chrono::{Months, NaiveDate, NaiveDateTime};

use crate::error::{LoanError, LoanResult};

/// Date exactly `months` calendar months after `start`.
///
/// Month-end dates clamp to the last valid day (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(start: NaiveDate, months: u32) -> LoanResult<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| LoanError::Date(format!("{} + {} months is out of range", start, months)))
}

/// Calendar days from `from` to `to`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Parse a contract date column.
///
/// Accepts ISO dates, ISO datetimes and slash-separated dates. Returns `None`
/// for blank or unparsable text so the caller can fall back to the run date.
pub fn parse_contract_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    None
}
