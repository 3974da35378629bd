//! In-memory loan source and schedule sink

use super::{LoanSource, ScheduleSink};
use crate::error::LoanResult;
use crate::loan::LoanInput;
use crate::schedule::ScheduleRow;

/// Holds loans and the last written schedule in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub loans: Vec<LoanInput>,
    pub schedule: Vec<ScheduleRow>,

    /// Number of schedule writes received
    pub writes: usize,
}

impl MemoryStore {
    pub fn with_loans(loans: Vec<LoanInput>) -> Self {
        Self {
            loans,
            ..Default::default()
        }
    }
}

impl LoanSource for MemoryStore {
    fn read_loans(&self) -> LoanResult<Vec<LoanInput>> {
        Ok(self.loans.clone())
    }
}

impl ScheduleSink for MemoryStore {
    fn write_schedule(&mut self, rows: &[ScheduleRow]) -> LoanResult<()> {
        self.schedule = rows.to_vec();
        self.writes += 1;
        Ok(())
    }
}
