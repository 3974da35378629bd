//! Date-stamped loan id generation with bounded collision retries

use std::collections::HashSet;

use chrono::NaiveDate;
use rand::Rng;

use crate::error::{LoanError, LoanResult};

/// Default number of draws before giving up on a unique id
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Generates ids of the form `LOAN-yymmdd-NNNN`.
///
/// The 4-digit suffix is random, so a single date has 10,000 possible ids.
/// Collisions against `existing` are retried up to `max_attempts` times.
#[derive(Debug)]
pub struct LoanIdGenerator<R: Rng> {
    rng: R,
    max_attempts: u32,
}

impl<R: Rng> LoanIdGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Date stamp used in the id (`yymmdd`)
    pub fn date_stamp(date: NaiveDate) -> String {
        date.format("%y%m%d").to_string()
    }

    /// Draw one id for `date` that is not in `existing`
    pub fn generate(&mut self, date: NaiveDate, existing: &HashSet<String>) -> LoanResult<String> {
        let stamp = Self::date_stamp(date);

        for _ in 0..self.max_attempts {
            let suffix: u32 = self.rng.gen_range(0..=9999);
            let candidate = format!("LOAN-{}-{:04}", stamp, suffix);
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(LoanError::IdSpaceExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Generate `count` ids for one batch.
    ///
    /// Ids produced earlier in the batch count as taken, so the batch is
    /// unique within itself as well as against `existing`.
    pub fn generate_batch(
        &mut self,
        count: usize,
        date: NaiveDate,
        existing: &HashSet<String>,
    ) -> LoanResult<Vec<String>> {
        let mut taken = existing.clone();
        let mut ids = Vec::with_capacity(count);

        for _ in 0..count {
            let id = self.generate(date, &taken)?;
            taken.insert(id.clone());
            ids.push(id);
        }

        Ok(ids)
    }
}
