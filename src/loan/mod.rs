//! Loan book data structures, registry and id generation

mod data;
mod book;
mod generator;
mod ids;

pub use data::{
    Borrower, Loan, LoanAction, LoanInput, LoanRecord, LoanStatus, MAX_CREDIT_SCORE, MAX_TERM_MONTHS,
    MIN_CREDIT_SCORE,
};
pub use book::{LoanBook, PAYOFF_TOLERANCE};
pub use generator::{apr_for_score, populate_loan_book, LOAN_TERMS};
pub use ids::{LoanIdGenerator, DEFAULT_MAX_ATTEMPTS};
