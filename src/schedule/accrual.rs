//! Actual/365 day-count accrual simulation
//!
//! This is the objective function handed to the rate solver: for a candidate
//! APR it returns the balance left after the last scheduled payment.

use chrono::NaiveDate;

use crate::calendar::{add_months, days_between};
use crate::error::LoanResult;

/// Day-count basis for the daily rate
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Boundary date and day count of one monthly period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub number: u32,
    pub end_date: NaiveDate,
    pub days: i64,
}

/// Calendar periods of a monthly loan.
///
/// Period `p` ends exactly `p` months after `start_date` (month-end clamped),
/// and its length is the calendar-day distance from the previous boundary.
pub fn periods(start_date: NaiveDate, term_months: u32) -> LoanResult<Vec<Period>> {
    let mut out = Vec::new();
    let mut previous = start_date;

    for number in 1..=term_months {
        let end_date = add_months(start_date, number)?;
        out.push(Period {
            number,
            end_date,
            days: days_between(previous, end_date),
        });
        previous = end_date;
    }

    Ok(out)
}

/// Daily rate for an APR given in percent
pub fn daily_rate(apr_percent: f64) -> f64 {
    apr_percent / 100.0 / DAYS_PER_YEAR
}

/// Balance remaining after `periods` at `candidate_apr` with a fixed payment.
///
/// Nothing is rounded and the result is not clamped: a negative value means
/// the payments overshoot, a positive one that they fall short.
pub fn balance_after(candidate_apr: f64, principal: f64, fixed_payment: f64, periods: &[Period]) -> f64 {
    let rate = daily_rate(candidate_apr);

    periods.iter().fold(principal, |balance, period| {
        let interest = balance * rate * period.days as f64;
        balance + interest - fixed_payment
    })
}

/// Final balance of a loan simulated under actual/365 accrual
pub fn final_balance(
    candidate_apr: f64,
    principal: f64,
    fixed_payment: f64,
    start_date: NaiveDate,
    term_months: u32,
) -> LoanResult<f64> {
    let periods = periods(start_date, term_months)?;
    Ok(balance_after(candidate_apr, principal, fixed_payment, &periods))
}
