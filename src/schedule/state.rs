//! Running state for one loan's schedule generation

use serde::{Deserialize, Serialize};

/// Phase of a loan within the period loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Standard months: interest accrues on the day count
    Accruing,
    /// Final month: amounts are forced to the contract totals. Terminal.
    Closing,
}

/// State of a loan between periods
#[derive(Debug, Clone)]
pub struct ReconcileState {
    /// Last period processed (0 before the first)
    pub period: u32,

    pub term_months: u32,

    /// Balance carried into the next period
    pub balance: f64,

    /// Interest charged in periods processed so far
    pub sum_interest: f64,

    /// Repayments collected in periods processed so far
    pub sum_repayment: f64,
}

impl ReconcileState {
    /// Initialize at the contract date with the full principal outstanding
    pub fn new(principal: f64, term_months: u32) -> Self {
        Self {
            period: 0,
            term_months,
            balance: principal,
            sum_interest: 0.0,
            sum_repayment: 0.0,
        }
    }

    /// Phase of the next period to process
    pub fn next_phase(&self) -> Phase {
        if self.period + 1 >= self.term_months {
            Phase::Closing
        } else {
            Phase::Accruing
        }
    }

    /// Whether the closing period has already been emitted
    pub fn is_closed(&self) -> bool {
        self.period >= self.term_months
    }

    /// Record a processed period and carry its closing balance forward
    pub fn advance(&mut self, interest: f64, repayment: f64, closing_balance: f64) {
        debug_assert!(!self.is_closed(), "period loop ran past the closing period");

        self.period += 1;
        self.sum_interest += interest;
        self.sum_repayment += repayment;
        self.balance = closing_balance;
    }
}
