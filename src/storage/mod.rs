//! Read-source and write-sink interfaces for loan records and schedules
//!
//! The reconciliation core only sees these traits. CSV files back the CLI and
//! an in-memory store backs the tests.

mod csv_store;
mod memory;

pub use csv_store::{
    load_loan_rows_from_reader, load_loans, load_loans_from_reader, normalize_column_name, write_loan_inputs,
    write_rows, write_rows_to_writer, write_schedule_to_writer, CsvLoanSource, CsvScheduleSink,
};
pub use memory::MemoryStore;

use crate::error::LoanResult;
use crate::loan::LoanInput;
use crate::schedule::ScheduleRow;

/// A source row that could not be read as a loan
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based line in the source, header included
    pub line: u64,

    /// Loan id cell, when the row had a readable one
    pub loan_id: Option<String>,
    pub reason: String,
}

/// Loans read from a source together with the rows that were rejected
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanRows {
    pub loans: Vec<LoanInput>,
    pub rejected: Vec<RejectedRow>,
}

/// Source of raw loan records
pub trait LoanSource {
    fn read_loans(&self) -> LoanResult<Vec<LoanInput>>;

    /// Loans plus any rows that failed to parse. Sources with typed storage
    /// never reject rows.
    fn read_loan_rows(&self) -> LoanResult<LoanRows> {
        Ok(LoanRows {
            loans: self.read_loans()?,
            rejected: Vec::new(),
        })
    }
}

/// Destination for generated schedules.
///
/// Each call replaces whatever a previous run wrote.
pub trait ScheduleSink {
    fn write_schedule(&mut self, rows: &[ScheduleRow]) -> LoanResult<()>;
}
