//! Closed-form payment formulas and the nominal amortization schedule

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_to_cents;
use crate::calendar::add_months;
use crate::error::{LoanError, LoanResult};
use crate::loan::Loan;

/// Fixed monthly payment that amortizes `principal` over `term_months`.
///
/// With a zero rate the principal is simply divided across the term. Otherwise
/// the annuity formula is applied at the monthly rate `apr_percent / 100 / 12`.
/// The result is rounded to cents.
pub fn payment(principal: f64, apr_percent: f64, term_months: u32) -> LoanResult<f64> {
    if term_months == 0 {
        return Err(LoanError::invalid("term_months", "must be > 0"));
    }

    let n = term_months as f64;
    if apr_percent == 0.0 {
        return Ok(round_to_cents(principal / n));
    }

    let monthly_rate = apr_percent / 100.0 / 12.0;
    let discount = (1.0 + monthly_rate).powf(-n);
    Ok(round_to_cents(principal * monthly_rate / (1.0 - discount)))
}

/// Contract totals under the flat-rate method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatRateTerms {
    /// Finance amount * rate * term in years
    pub total_interest: f64,

    /// Finance amount plus total interest
    pub total_payable: f64,

    /// Total payable spread evenly over the term
    pub monthly_repayment: f64,
}

impl FlatRateTerms {
    /// Compute flat-rate totals, each rounded to cents
    pub fn compute(finance_amount: f64, flat_rate_percent: f64, term_months: u32) -> LoanResult<Self> {
        if term_months == 0 {
            return Err(LoanError::invalid("term_months", "must be > 0"));
        }

        let term_years = term_months as f64 / 12.0;
        let total_interest = finance_amount * (flat_rate_percent / 100.0) * term_years;
        let total_payable = finance_amount + total_interest;
        let monthly_repayment = total_payable / term_months as f64;

        Ok(Self {
            total_interest: round_to_cents(total_interest),
            total_payable: round_to_cents(total_payable),
            monthly_repayment: round_to_cents(monthly_repayment),
        })
    }
}

/// One period of a nominal (monthly-rate) amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: u32,
    pub date: NaiveDate,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

/// Payment-by-payment schedule for a book loan at its nominal monthly rate.
///
/// Interest and principal are rounded each period. The final period repays
/// whatever balance remains, so the schedule always ends at zero.
///
/// Period `p` falls `p` months after the start date rather than one month
/// after the previous row, so a loan from 2024-01-31 pays on Feb 29, then Mar 31.
pub fn amortization_schedule(loan: &Loan) -> LoanResult<Vec<AmortizationRow>> {
    let monthly_rate = loan.apr / 100.0 / 12.0;
    let mut balance = loan.principal;
    let mut rows = Vec::with_capacity(loan.term_months as usize);

    for period in 1..=loan.term_months {
        let interest = round_to_cents(balance * monthly_rate);
        let principal = if period == loan.term_months {
            balance
        } else {
            round_to_cents(loan.monthly_payment - interest)
        };

        balance = round_to_cents(balance - principal);

        rows.push(AmortizationRow {
            period,
            date: add_months(loan.start_date, period)?,
            payment: loan.monthly_payment,
            principal,
            interest,
            // abs() folds -0.00 into 0.00
            balance: balance.abs(),
        });
    }

    Ok(rows)
}
