//! Reconciled schedule output structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::round_to_cents;
use super::solver::RateSolution;

/// Contract totals a reconciled schedule must sum to exactly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationTarget {
    pub total_interest: f64,
    pub total_payable: f64,
}

impl ReconciliationTarget {
    /// Flat-rate totals: principal * rate * years, plus principal, both to cents
    pub fn from_flat_rate(principal: f64, flat_rate_percent: f64, term_months: u32) -> Self {
        let total_interest = round_to_cents(principal * (flat_rate_percent / 100.0) * (term_months as f64 / 12.0));
        Self {
            total_interest,
            total_payable: round_to_cents(principal + total_interest),
        }
    }
}

/// A single period of a reconciled schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub loan_id: String,
    pub period: u32,
    pub payment_date: NaiveDate,
    pub days_in_period: i64,

    /// Solved effective APR (percent, 6 dp) the row was accrued at
    pub nominal_apr: f64,
    pub opening_balance: f64,
    pub interest_amount: f64,
    pub repayment_amount: f64,
    pub closing_balance: f64,
}

impl ScheduleRow {
    /// Part of the repayment that reduces principal
    pub fn principal_portion(&self) -> f64 {
        self.repayment_amount - self.interest_amount
    }
}

/// Conditions detected while closing a schedule that make it suspect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClosureAnomaly {
    /// Earlier repayments already exceed the contractual total payable, so the
    /// final period carries a negative principal portion
    NegativeFinalPrincipal { principal_portion: f64 },
}

/// Complete reconciliation result for one loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledSchedule {
    pub loan_id: String,
    pub target: ReconciliationTarget,
    pub rate: RateSolution,
    pub rows: Vec<ScheduleRow>,

    /// Sum of the interest column, final period included
    pub actual_total_interest: f64,

    /// Sum of the repayment column, final period included
    pub actual_total_payable: f64,

    /// Final-period opening balance minus its principal portion. Non-zero when
    /// the solved rate did not land the running balance on the contract totals.
    pub closure_residual: f64,
    pub anomalies: Vec<ClosureAnomaly>,
}

impl ReconciledSchedule {
    /// `(target_interest, actual_interest)` pair used for discrepancy reports
    pub fn interest_check(&self) -> (f64, f64) {
        (self.target.total_interest, self.actual_total_interest)
    }

    /// Absolute gap between target and scheduled interest
    pub fn interest_discrepancy(&self) -> f64 {
        (self.target.total_interest - self.actual_total_interest).abs()
    }

    pub fn final_row(&self) -> Option<&ScheduleRow> {
        self.rows.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_rate_target() {
        let target = ReconciliationTarget::from_flat_rate(20_000.0, 6.0, 36);
        assert_eq!(target.total_interest, 3_600.0);
        assert_eq!(target.total_payable, 23_600.0);

        let target = ReconciliationTarget::from_flat_rate(12_345.67, 7.25, 18);
        assert_eq!(target.total_interest, 1_342.59);
        assert_eq!(target.total_payable, 13_688.26);
    }
}
