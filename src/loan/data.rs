//! Loan, borrower and reconciliation input records

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::calendar::{add_months, parse_contract_date};
use crate::error::{LoanError, LoanResult};
use crate::schedule::payment;

/// Lowest credit score accepted (exclusive)
pub const MIN_CREDIT_SCORE: u16 = 300;

/// Highest credit score accepted (exclusive)
pub const MAX_CREDIT_SCORE: u16 = 850;

/// Longest loan term accepted, in months
pub const MAX_TERM_MONTHS: u32 = 1200;

/// Lifecycle status of a registry loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Performing, balance outstanding
    Active,
    /// Terminated for non-payment
    Default,
    /// Closed by a full settlement
    Settled,
    /// Balance reduced to zero by lump-sum payments
    PaidOff,
}

/// Operations that move a loan between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    Default,
    Settle,
    PartialSettle,
    PayOff,
}

impl LoanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanAction::Default => "default",
            LoanAction::Settle => "settle",
            LoanAction::PartialSettle => "partially settle",
            LoanAction::PayOff => "pay off",
        }
    }
}

impl LoanStatus {
    /// Status transition table. `None` means the action is illegal from `self`.
    pub fn transition(self, action: LoanAction) -> Option<LoanStatus> {
        use LoanAction as A;
        use LoanStatus as S;

        match (self, action) {
            (S::Active, A::Default) => Some(S::Default),
            (S::Active | S::Default, A::Settle) => Some(S::Settled),
            (S::Active, A::PartialSettle) => Some(S::Active),
            (S::Active, A::PayOff) => Some(S::PaidOff),
            _ => None,
        }
    }

    /// Settled and paid-off loans are closed for good
    pub fn is_closed(&self) -> bool {
        matches!(self, LoanStatus::Settled | LoanStatus::PaidOff)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Default => "default",
            LoanStatus::Settled => "settled",
            LoanStatus::PaidOff => "paid_off",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrower on the loan book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub credit_score: u16,
}

impl Borrower {
    /// Create a borrower, rejecting credit scores outside (300, 850)
    pub fn new(id: &str, first_name: &str, last_name: &str, credit_score: u16) -> LoanResult<Self> {
        if credit_score <= MIN_CREDIT_SCORE || credit_score >= MAX_CREDIT_SCORE {
            return Err(LoanError::invalid(
                "credit_score",
                format!(
                    "{} is outside ({}, {})",
                    credit_score, MIN_CREDIT_SCORE, MAX_CREDIT_SCORE
                ),
            ));
        }

        Ok(Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            credit_score,
        })
    }
}

fn check_principal(principal: f64) -> LoanResult<()> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(LoanError::invalid("principal", format!("{} must be > 0", principal)));
    }
    Ok(())
}

fn check_apr(apr: f64) -> LoanResult<()> {
    if !apr.is_finite() || apr <= 0.0 || apr >= 100.0 {
        return Err(LoanError::invalid("apr", format!("{} is outside (0, 100)", apr)));
    }
    Ok(())
}

fn check_term(term_months: u32) -> LoanResult<()> {
    if term_months == 0 || term_months > MAX_TERM_MONTHS {
        return Err(LoanError::invalid(
            "term_months",
            format!("{} is outside 1..={}", term_months, MAX_TERM_MONTHS),
        ));
    }
    Ok(())
}

/// A loan held on the book.
///
/// Contract terms are fixed at creation. Status, balance and the
/// termination/settlement dates only change through [`crate::loan::LoanBook`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub borrower_id: String,
    pub principal: f64,

    /// Nominal annual rate in percent (e.g. 5.0)
    pub apr: f64,
    pub term_months: u32,

    /// Contract date
    pub start_date: NaiveDate,

    /// Final contractual payment date
    pub maturity_date: NaiveDate,
    pub monthly_payment: f64,

    pub(crate) status: LoanStatus,
    pub(crate) outstanding_balance: f64,
    pub(crate) termination_date: Option<NaiveDate>,
    pub(crate) settlement_date: Option<NaiveDate>,
}

impl Loan {
    /// Create an active loan, computing its fixed payment and maturity date
    pub fn new(
        id: &str,
        borrower_id: &str,
        principal: f64,
        apr: f64,
        term_months: u32,
        start_date: NaiveDate,
    ) -> LoanResult<Self> {
        check_principal(principal)?;
        check_apr(apr)?;
        check_term(term_months)?;

        let monthly_payment = payment(principal, apr, term_months)?;
        let maturity_date = add_months(start_date, term_months)?;

        Ok(Self {
            id: id.to_string(),
            borrower_id: borrower_id.to_string(),
            principal,
            apr,
            term_months,
            start_date,
            maturity_date,
            monthly_payment,
            status: LoanStatus::Active,
            outstanding_balance: principal,
            termination_date: None,
            settlement_date: None,
        })
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn outstanding_balance(&self) -> f64 {
        self.outstanding_balance
    }

    /// Date of default, if any
    pub fn termination_date(&self) -> Option<NaiveDate> {
        self.termination_date
    }

    /// Date the balance went to zero, if any
    pub fn settlement_date(&self) -> Option<NaiveDate> {
        self.settlement_date
    }
}

/// Validated input to the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    id: String,
    principal: f64,
    apr: f64,
    term_months: u32,
    start_date: NaiveDate,
    monthly_payment: f64,
}

impl LoanRecord {
    /// Build a record, rejecting non-positive principal/payment/term and an
    /// APR outside (0, 100)
    pub fn new(
        id: &str,
        principal: f64,
        apr: f64,
        term_months: u32,
        start_date: NaiveDate,
        monthly_payment: f64,
    ) -> LoanResult<Self> {
        check_principal(principal)?;
        check_apr(apr)?;
        check_term(term_months)?;
        if !monthly_payment.is_finite() || monthly_payment <= 0.0 {
            return Err(LoanError::invalid(
                "monthly_payment",
                format!("{} must be > 0", monthly_payment),
            ));
        }

        Ok(Self {
            id: id.to_string(),
            principal,
            apr,
            term_months,
            start_date,
            monthly_payment,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    /// Nominal flat rate in percent
    pub fn apr(&self) -> f64 {
        self.apr
    }

    pub fn term_months(&self) -> u32 {
        self.term_months
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn monthly_payment(&self) -> f64 {
        self.monthly_payment
    }
}

/// Month counts stored as floats (`60.0`) are accepted when they are whole
fn whole_months<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("{} is not a whole number of months", value)));
    }
    Ok(value as u32)
}

/// Raw loan row as stored by the source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInput {
    pub loan_id: String,

    #[serde(rename = "finance_amount")]
    pub principal: f64,

    #[serde(deserialize_with = "whole_months")]
    pub term_months: u32,

    #[serde(rename = "monthly_repayment", default, deserialize_with = "csv::invalid_option")]
    pub monthly_payment: Option<f64>,

    #[serde(rename = "flat_rate_percent")]
    pub flat_rate: f64,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub contract_date: Option<String>,
}

impl LoanInput {
    /// Whether the row carries a usable monthly repayment
    pub fn has_payment(&self) -> bool {
        matches!(self.monthly_payment, Some(p) if p.is_finite())
    }

    /// Contract date, falling back to `run_date` when absent or unparsable
    pub fn start_date(&self, run_date: NaiveDate) -> NaiveDate {
        self.contract_date
            .as_deref()
            .and_then(parse_contract_date)
            .unwrap_or(run_date)
    }

    /// Convert to a validated [`LoanRecord`].
    ///
    /// A missing repayment is an error unless `derive_missing_payment` is set,
    /// in which case the fixed payment is computed from the flat rate.
    pub fn to_record(&self, run_date: NaiveDate, derive_missing_payment: bool) -> LoanResult<LoanRecord> {
        check_term(self.term_months)?;

        let monthly_payment = match self.monthly_payment.filter(|p| p.is_finite()) {
            Some(p) => p,
            None if derive_missing_payment => payment(self.principal, self.flat_rate, self.term_months)?,
            None => return Err(LoanError::invalid("monthly_repayment", "missing")),
        };

        LoanRecord::new(
            &self.loan_id,
            self.principal,
            self.flat_rate,
            self.term_months,
            self.start_date(run_date),
            monthly_payment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(payment: Option<f64>, contract_date: Option<&str>) -> LoanInput {
        LoanInput {
            loan_id: "LOAN-240101-0001".to_string(),
            principal: 20_000.0,
            term_months: 36,
            monthly_payment: payment,
            flat_rate: 6.0,
            contract_date: contract_date.map(str::to_string),
        }
    }

    #[test]
    fn test_status_transition_table() {
        assert_eq!(LoanStatus::Active.transition(LoanAction::Default), Some(LoanStatus::Default));
        assert_eq!(LoanStatus::Default.transition(LoanAction::Settle), Some(LoanStatus::Settled));
        assert_eq!(LoanStatus::Active.transition(LoanAction::PayOff), Some(LoanStatus::PaidOff));
        assert_eq!(LoanStatus::Settled.transition(LoanAction::Settle), None);
        assert_eq!(LoanStatus::PaidOff.transition(LoanAction::Default), None);
        assert_eq!(LoanStatus::Default.transition(LoanAction::Default), None);
        assert_eq!(LoanStatus::Default.transition(LoanAction::PartialSettle), None);
    }

    #[test]
    fn test_borrower_credit_score_bounds() {
        assert!(Borrower::new("CUST-0001", "Ava", "Smith", 700).is_ok());
        assert!(Borrower::new("CUST-0001", "Ava", "Smith", 300).is_err());
        assert!(Borrower::new("CUST-0001", "Ava", "Smith", 850).is_err());
    }

    #[test]
    fn test_loan_new_sets_terms() {
        let loan = Loan::new("LOAN-0001", "CUST-0001", 10_000.0, 6.0, 12, date(2024, 1, 31)).unwrap();
        assert_eq!(loan.maturity_date, date(2025, 1, 31));
        assert_eq!(loan.monthly_payment, 860.66);
        assert_eq!(loan.status(), LoanStatus::Active);
        assert_eq!(loan.outstanding_balance(), 10_000.0);
    }

    #[test]
    fn test_loan_rejects_bad_terms() {
        let start = date(2024, 1, 1);
        assert!(Loan::new("L", "C", 0.0, 6.0, 12, start).is_err());
        assert!(Loan::new("L", "C", 1000.0, 0.0, 12, start).is_err());
        assert!(Loan::new("L", "C", 1000.0, 100.0, 12, start).is_err());
        assert!(Loan::new("L", "C", 1000.0, 6.0, 0, start).is_err());
        assert!(Loan::new("L", "C", 1000.0, 6.0, MAX_TERM_MONTHS + 1, start).is_err());
        assert!(LoanRecord::new("L", 1000.0, 6.0, 4_000_000_000, start, 90.0).is_err());
    }

    #[test]
    fn test_record_rejects_non_positive_payment() {
        let start = date(2024, 1, 1);
        assert!(LoanRecord::new("L", 1000.0, 6.0, 12, start, 0.0).is_err());
        assert!(LoanRecord::new("L", 1000.0, 6.0, 12, start, f64::NAN).is_err());
        assert!(LoanRecord::new("L", 1000.0, 6.0, 12, start, 90.0).is_ok());
    }

    #[test]
    fn test_input_missing_payment() {
        let run_date = date(2024, 6, 1);
        let raw = input(None, Some("2024-01-15"));
        assert!(!raw.has_payment());
        assert!(raw.to_record(run_date, false).is_err());

        let derived = raw.to_record(run_date, true).unwrap();
        assert_eq!(derived.monthly_payment(), payment(20_000.0, 6.0, 36).unwrap());
        assert_eq!(derived.start_date(), date(2024, 1, 15));
    }

    #[test]
    fn test_input_defaults_contract_date() {
        let run_date = date(2024, 6, 1);
        assert_eq!(input(Some(655.56), None).start_date(run_date), run_date);
        assert_eq!(input(Some(655.56), Some("garbage")).start_date(run_date), run_date);
    }
}
