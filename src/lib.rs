//! Loan Reconciler - consumer installment loan book and flat-rate reconciliation engine
//!
//! This library provides:
//! - Amortizing payment formula and nominal amortization schedules
//! - A loan book with status transitions (default, settlement, partial settlement)
//! - Actual/365 day-count accrual and APR root-finding
//! - Schedule reconciliation that closes exactly on flat-rate contract totals
//! - Batch runs over pluggable loan sources and schedule sinks
//! - Synthetic car-finance records for testing and demos

pub mod batch;
pub mod calendar;
pub mod config;
pub mod error;
pub mod loan;
pub mod schedule;
pub mod storage;
pub mod synthetic;

// Re-export commonly used types
pub use batch::{BatchReport, BatchRunner, Discrepancy, DiscrepancyKind, Skipped};
pub use config::ReconcileConfig;
pub use error::{LoanError, LoanResult};
pub use loan::{Borrower, Loan, LoanBook, LoanInput, LoanRecord, LoanStatus};
pub use schedule::{payment, FlatRateTerms, ReconciledSchedule, ScheduleReconciler, ScheduleRow};
