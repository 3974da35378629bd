//! Error types for the loan book and reconciliation engine

use thiserror::Error;

use crate::loan::LoanStatus;

/// Result alias used throughout the crate
pub type LoanResult<T> = Result<T, LoanError>;

/// Errors raised by loan construction, registry transitions, solving and I/O
#[derive(Error, Debug)]
pub enum LoanError {
    /// A field failed constructor-time validation
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    /// Root is not bracketed by the search interval
    #[error("No sign change in [{lower}, {upper}]: f(lower) = {f_lower:.4e}, f(upper) = {f_upper:.4e}")]
    NoSignChange {
        lower: f64,
        upper: f64,
        f_lower: f64,
        f_upper: f64,
    },

    /// Root-finder exhausted its iteration budget
    #[error("Convergence failed after {iterations} iterations (last estimate: {estimate})")]
    ConvergenceFailed { iterations: u32, estimate: f64 },

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    #[error("Borrower not found: {0}")]
    BorrowerNotFound(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Status change not permitted by the loan status transition table
    #[error("Loan {loan_id} cannot {action} from status {from}")]
    IllegalTransition {
        loan_id: String,
        from: LoanStatus,
        action: &'static str,
    },

    /// Every retry produced an id already in use
    #[error("Could not generate a unique id after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },

    #[error("Date error: {0}")]
    Date(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoanError {
    /// Shorthand for an `InvalidInput` error
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LoanError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
