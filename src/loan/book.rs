//! In-process loan book: borrowers, loans and their status transitions

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{info, warn};

use super::{Borrower, Loan, LoanAction, LoanStatus};
use crate::error::{LoanError, LoanResult};

/// Remaining balance at or below which a partial settlement pays the loan off
pub const PAYOFF_TOLERANCE: f64 = 0.01;

/// Owned registry of borrowers and loans.
///
/// Loans are only mutated through the status operations below, each of which
/// consults [`LoanStatus::transition`] before changing anything.
#[derive(Debug, Clone, Default)]
pub struct LoanBook {
    borrowers: BTreeMap<String, Borrower>,
    loans: BTreeMap<String, Loan>,
}

impl LoanBook {
    /// Create an empty loan book
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a borrower
    pub fn add_borrower(&mut self, id: &str, first: &str, last: &str, credit_score: u16) -> LoanResult<&Borrower> {
        if self.borrowers.contains_key(id) {
            return Err(LoanError::DuplicateId(id.to_string()));
        }
        let borrower = Borrower::new(id, first, last, credit_score)?;
        Ok(&*self.borrowers.entry(id.to_string()).or_insert(borrower))
    }

    /// Create an active loan for an existing borrower
    pub fn create_loan(
        &mut self,
        id: &str,
        borrower_id: &str,
        principal: f64,
        apr: f64,
        months: u32,
        start_date: NaiveDate,
    ) -> LoanResult<&Loan> {
        if self.loans.contains_key(id) {
            return Err(LoanError::DuplicateId(id.to_string()));
        }
        if !self.borrowers.contains_key(borrower_id) {
            return Err(LoanError::BorrowerNotFound(borrower_id.to_string()));
        }

        let loan = Loan::new(id, borrower_id, principal, apr, months, start_date)?;
        Ok(&*self.loans.entry(id.to_string()).or_insert(loan))
    }

    pub fn get_loan(&self, id: &str) -> Option<&Loan> {
        self.loans.get(id)
    }

    pub fn get_borrower(&self, id: &str) -> Option<&Borrower> {
        self.borrowers.get(id)
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    pub fn borrowers(&self) -> impl Iterator<Item = &Borrower> {
        self.borrowers.values()
    }

    pub fn loan_count(&self) -> usize {
        self.loans.len()
    }

    pub fn borrower_count(&self) -> usize {
        self.borrowers.len()
    }

    /// Look up a loan and check `action` is legal from its current status
    fn loan_for(&mut self, id: &str, action: LoanAction) -> LoanResult<(&mut Loan, LoanStatus)> {
        let loan = self
            .loans
            .get_mut(id)
            .ok_or_else(|| LoanError::LoanNotFound(id.to_string()))?;

        let next = loan.status.transition(action).ok_or(LoanError::IllegalTransition {
            loan_id: id.to_string(),
            from: loan.status,
            action: action.as_str(),
        })?;

        Ok((loan, next))
    }

    /// Mark an active loan as defaulted and record the termination date
    pub fn default_loan(&mut self, id: &str, reason: &str, on: NaiveDate) -> LoanResult<&Loan> {
        let (loan, next) = self.loan_for(id, LoanAction::Default)?;

        loan.status = next;
        loan.termination_date = Some(on);
        info!("Loan {} is now set to DEFAULT. Reason: {}", id, reason);
        Ok(&*loan)
    }

    /// Fully settle a loan, writing the outstanding balance down to zero
    pub fn settle_loan(&mut self, id: &str, on: NaiveDate) -> LoanResult<&Loan> {
        let (loan, next) = self.loan_for(id, LoanAction::Settle)?;

        if loan.outstanding_balance > 0.0 {
            warn!(
                "Settling loan {} while balance is {:.2}. Balance is being set to 0.0.",
                id, loan.outstanding_balance
            );
        }

        loan.outstanding_balance = 0.0;
        loan.status = next;
        loan.settlement_date = Some(on);
        info!("Loan {} is now fully SETTLED", id);
        Ok(&*loan)
    }

    /// Apply a lump-sum payment to an active loan.
    ///
    /// Amounts above the outstanding balance are capped. A remaining balance of
    /// [`PAYOFF_TOLERANCE`] or less pays the loan off.
    pub fn partial_settle_loan(&mut self, id: &str, amount: f64, on: NaiveDate) -> LoanResult<&Loan> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LoanError::invalid("settlement_amount", "must be positive"));
        }

        let (loan, next) = self.loan_for(id, LoanAction::PartialSettle)?;

        let mut amount = amount;
        if amount > loan.outstanding_balance {
            warn!(
                "Settlement amount {:.2} exceeds outstanding balance {:.2} on {}; using full balance",
                amount, loan.outstanding_balance, id
            );
            amount = loan.outstanding_balance;
        }

        loan.outstanding_balance -= amount;
        loan.status = next;
        info!(
            "Recorded partial settlement of {:.2} on {}. New outstanding balance: {:.2}",
            amount, id, loan.outstanding_balance
        );

        if loan.outstanding_balance <= PAYOFF_TOLERANCE {
            // Active -> PaidOff is always in the table
            if let Some(paid_off) = loan.status.transition(LoanAction::PayOff) {
                loan.outstanding_balance = 0.0;
                loan.status = paid_off;
                loan.settlement_date = Some(on);
                info!("Partial settlement resulted in full payoff. Loan {} is now PAID OFF", id);
            }
        }

        Ok(&*loan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn book_with_loan() -> LoanBook {
        let mut book = LoanBook::new();
        book.add_borrower("CUST-0001", "Emma", "Smith", 720).unwrap();
        book.create_loan("LOAN-0001", "CUST-0001", 12_000.0, 7.5, 36, date(2024, 1, 15))
            .unwrap();
        book
    }

    #[test]
    fn test_create_loan_requires_borrower() {
        let mut book = LoanBook::new();
        let err = book
            .create_loan("LOAN-0001", "CUST-9999", 12_000.0, 7.5, 36, date(2024, 1, 15))
            .unwrap_err();
        assert!(matches!(err, LoanError::BorrowerNotFound(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut book = book_with_loan();
        assert!(matches!(
            book.add_borrower("CUST-0001", "Liam", "Jones", 650),
            Err(LoanError::DuplicateId(_))
        ));
        assert!(matches!(
            book.create_loan("LOAN-0001", "CUST-0001", 5_000.0, 5.0, 12, date(2024, 1, 1)),
            Err(LoanError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_default_then_settle() {
        let mut book = book_with_loan();
        let on = date(2024, 6, 1);

        let loan = book.default_loan("LOAN-0001", "Failure to pay", on).unwrap();
        assert_eq!(loan.status(), LoanStatus::Default);
        assert_eq!(loan.termination_date(), Some(on));

        // Cannot default twice
        assert!(matches!(
            book.default_loan("LOAN-0001", "again", on),
            Err(LoanError::IllegalTransition { .. })
        ));

        let loan = book.settle_loan("LOAN-0001", date(2024, 7, 1)).unwrap();
        assert_eq!(loan.status(), LoanStatus::Settled);
        assert_eq!(loan.outstanding_balance(), 0.0);
        assert_eq!(loan.settlement_date(), Some(date(2024, 7, 1)));
    }

    #[test]
    fn test_cannot_settle_settled_loan() {
        let mut book = book_with_loan();
        book.settle_loan("LOAN-0001", date(2024, 6, 1)).unwrap();

        let err = book.settle_loan("LOAN-0001", date(2024, 6, 2)).unwrap_err();
        assert!(matches!(
            err,
            LoanError::IllegalTransition { from: LoanStatus::Settled, .. }
        ));
        assert!(book.default_loan("LOAN-0001", "late", date(2024, 6, 2)).is_err());
    }

    #[test]
    fn test_partial_settlement_and_payoff() {
        let mut book = book_with_loan();
        let on = date(2024, 3, 1);

        let loan = book.partial_settle_loan("LOAN-0001", 2_000.0, on).unwrap();
        assert_eq!(loan.status(), LoanStatus::Active);
        assert_eq!(loan.outstanding_balance(), 10_000.0);
        assert_eq!(loan.settlement_date(), None);

        // Overpayment is capped at the balance and pays the loan off
        let loan = book.partial_settle_loan("LOAN-0001", 50_000.0, on).unwrap();
        assert_eq!(loan.status(), LoanStatus::PaidOff);
        assert_eq!(loan.outstanding_balance(), 0.0);
        assert_eq!(loan.settlement_date(), Some(on));

        assert!(book.partial_settle_loan("LOAN-0001", 10.0, on).is_err());
    }

    #[test]
    fn test_partial_settlement_within_tolerance_pays_off() {
        let mut book = book_with_loan();
        let loan = book.partial_settle_loan("LOAN-0001", 11_999.995, date(2024, 3, 1)).unwrap();
        assert_eq!(loan.status(), LoanStatus::PaidOff);
        assert_eq!(loan.outstanding_balance(), 0.0);
    }

    #[test]
    fn test_partial_settlement_rejects_bad_amount_and_status() {
        let mut book = book_with_loan();
        let on = date(2024, 3, 1);
        assert!(matches!(
            book.partial_settle_loan("LOAN-0001", 0.0, on),
            Err(LoanError::InvalidInput { .. })
        ));

        book.default_loan("LOAN-0001", "Failure to pay", on).unwrap();
        assert!(matches!(
            book.partial_settle_loan("LOAN-0001", 100.0, on),
            Err(LoanError::IllegalTransition { .. })
        ));
        assert!(matches!(
            book.partial_settle_loan("LOAN-9999", 100.0, on),
            Err(LoanError::LoanNotFound(_))
        ));
    }
}
