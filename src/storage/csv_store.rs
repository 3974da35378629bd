//! CSV-backed loan source and schedule sink

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ErrorKind, Reader, StringRecord, Writer};
use log::{info, warn};
use serde::Serialize;

use super::{LoanRows, LoanSource, RejectedRow, ScheduleSink};
use crate::error::LoanResult;
use crate::loan::LoanInput;
use crate::schedule::ScheduleRow;

/// Normalize a column header to snake_case.
///
/// `"Flat Rate (%)"` becomes `"flat_rate_percent"` and `"Term (Months)"`
/// becomes `"term_months"`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
        .replace('%', "percent")
}

fn read_rows<R: Read>(mut reader: Reader<R>) -> LoanResult<LoanRows> {
    let headers: StringRecord = reader.headers()?.iter().map(normalize_column_name).collect();
    let id_column = headers.iter().position(|h| h == "loan_id");
    reader.set_headers(headers.clone());

    let mut rows = LoanRows::default();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            // Only a failing underlying reader ends the read
            Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                reject(&mut rows, line, None, e.to_string());
                continue;
            }
        };

        match record.deserialize::<LoanInput>(Some(&headers)) {
            Ok(loan) => rows.loans.push(loan),
            Err(e) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                let loan_id = id_column
                    .and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
                reject(&mut rows, line, loan_id, e.to_string());
            }
        }
    }

    Ok(rows)
}

fn reject(rows: &mut LoanRows, line: u64, loan_id: Option<String>, reason: String) {
    warn!(
        "Rejected line {} ({}): {}",
        line,
        loan_id.as_deref().unwrap_or("no loan id"),
        reason
    );
    rows.rejected.push(RejectedRow { line, loan_id, reason });
}

/// Load raw loan rows from a CSV file. Unreadable rows are logged and dropped.
pub fn load_loans<P: AsRef<Path>>(path: P) -> LoanResult<Vec<LoanInput>> {
    Ok(read_rows(Reader::from_path(path)?)?.loans)
}

/// Load raw loan rows from any reader (e.g. string buffer, network stream)
pub fn load_loans_from_reader<R: Read>(reader: R) -> LoanResult<Vec<LoanInput>> {
    Ok(read_rows(Reader::from_reader(reader))?.loans)
}

/// Load loan rows from any reader, keeping the rows that failed to parse
pub fn load_loan_rows_from_reader<R: Read>(reader: R) -> LoanResult<LoanRows> {
    read_rows(Reader::from_reader(reader))
}

/// Serialize rows, with a header line, to any writer
pub fn write_rows_to_writer<W: Write, T: Serialize>(writer: W, rows: &[T]) -> LoanResult<()> {
    let mut csv_writer = Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Serialize rows, with a header line, to a new or truncated file
pub fn write_rows<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> LoanResult<()> {
    write_rows_to_writer(File::create(path)?, rows)
}

/// Write schedule rows, with a header line, to any writer
pub fn write_schedule_to_writer<W: Write>(writer: W, rows: &[ScheduleRow]) -> LoanResult<()> {
    write_rows_to_writer(writer, rows)
}

/// Write loan rows in the same layout [`load_loans`] reads
pub fn write_loan_inputs<P: AsRef<Path>>(path: P, loans: &[LoanInput]) -> LoanResult<()> {
    write_rows(path, loans)
}

/// Reads loans from a CSV file on every call
#[derive(Debug, Clone)]
pub struct CsvLoanSource {
    path: PathBuf,
}

impl CsvLoanSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl LoanSource for CsvLoanSource {
    fn read_loans(&self) -> LoanResult<Vec<LoanInput>> {
        load_loans(&self.path)
    }

    fn read_loan_rows(&self) -> LoanResult<LoanRows> {
        read_rows(Reader::from_path(&self.path)?)
    }
}

/// Truncates and rewrites a CSV file on every write
#[derive(Debug, Clone)]
pub struct CsvScheduleSink {
    path: PathBuf,
}

impl CsvScheduleSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleSink for CsvScheduleSink {
    fn write_schedule(&mut self, rows: &[ScheduleRow]) -> LoanResult<()> {
        let file = File::create(&self.path)?;
        write_schedule_to_writer(file, rows)?;
        info!("Wrote {} schedule rows to {}", rows.len(), self.path.display());
        Ok(())
    }
}
