//! Synthetic car-finance records
//!
//! Records normally come from an external text-generation service. That
//! service sits behind [`SyntheticSource`]; [`RandomSyntheticSource`] is an
//! offline stand-in used by the CLI and tests.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::LoanResult;
use crate::loan::{LoanIdGenerator, LoanInput};
use crate::schedule::{round_to_cents, FlatRateTerms};

/// Standard car finance terms, in months
pub const CAR_LOAN_TERMS: [u32; 7] = [12, 24, 36, 48, 60, 72, 84];

/// Makes with a rough new-vehicle price band (low, high)
const CAR_MAKES: [(&str, f64, f64); 10] = [
    ("Toyota", 22_000.0, 45_000.0),
    ("Honda", 21_000.0, 40_000.0),
    ("Ford", 24_000.0, 60_000.0),
    ("Kia", 18_000.0, 38_000.0),
    ("Volkswagen", 23_000.0, 45_000.0),
    ("BMW", 42_000.0, 95_000.0),
    ("Mercedes-Benz", 45_000.0, 110_000.0),
    ("Audi", 40_000.0, 85_000.0),
    ("Tesla", 40_000.0, 90_000.0),
    ("Nissan", 19_000.0, 42_000.0),
];

/// One generated car-finance record, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticLoan {
    pub car_make: String,
    pub car_value: f64,
    pub car_age_months: f64,
    pub car_mileage: u32,
    pub finance_amount: f64,
    pub flat_rate_percent: f64,
    pub term_months: u32,
}

impl SyntheticLoan {
    /// Flat-rate totals for this record
    pub fn terms(&self) -> LoanResult<FlatRateTerms> {
        FlatRateTerms::compute(self.finance_amount, self.flat_rate_percent, self.term_months)
    }

    /// Attach an id and contract date, filling in the flat-rate totals
    pub fn into_generated(self, loan_id: String, contract_date: NaiveDate) -> LoanResult<GeneratedLoan> {
        let terms = self.terms()?;
        Ok(GeneratedLoan {
            loan_id,
            contract_date,
            car_make: self.car_make,
            car_value: self.car_value,
            car_age_months: self.car_age_months,
            car_mileage: self.car_mileage,
            finance_amount: self.finance_amount,
            flat_rate_percent: self.flat_rate_percent,
            term_months: self.term_months,
            total_interest: terms.total_interest,
            total_payable: terms.total_payable,
            monthly_repayment: terms.monthly_repayment,
        })
    }

    /// Convert to a loan row with its flat-rate monthly repayment filled in
    pub fn into_input(self, loan_id: String, contract_date: NaiveDate) -> LoanResult<LoanInput> {
        Ok(self.into_generated(loan_id, contract_date)?.to_input())
    }
}

/// A synthetic record with its id, contract date and flat-rate totals.
///
/// Stored as-is by the `generate` command. The loan columns use the names
/// [`LoanInput`] reads, so a generated file can be reconciled directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLoan {
    pub loan_id: String,
    pub contract_date: NaiveDate,
    pub car_make: String,
    pub car_value: f64,
    pub car_age_months: f64,
    pub car_mileage: u32,
    pub finance_amount: f64,
    pub flat_rate_percent: f64,
    pub term_months: u32,
    pub total_interest: f64,
    pub total_payable: f64,
    pub monthly_repayment: f64,
}

impl GeneratedLoan {
    /// The reconciliation columns of this record
    pub fn to_input(&self) -> LoanInput {
        LoanInput {
            loan_id: self.loan_id.clone(),
            principal: self.finance_amount,
            term_months: self.term_months,
            monthly_payment: Some(self.monthly_repayment),
            flat_rate: self.flat_rate_percent,
            contract_date: Some(self.contract_date.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Supplier of synthetic loan records
pub trait SyntheticSource {
    fn fetch_synthetic_records(&mut self, count: usize) -> LoanResult<Vec<SyntheticLoan>>;
}

/// Offline generator producing plausible car-finance records
#[derive(Debug)]
pub struct RandomSyntheticSource<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomSyntheticSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn record(&mut self) -> SyntheticLoan {
        let rng = &mut self.rng;
        let &(make, low, high) = CAR_MAKES.choose(rng).unwrap_or(&CAR_MAKES[0]);

        let car_age_months = rng.gen_range(0..=96) as f64;
        let new_value = rng.gen_range(low..=high);
        // Roughly 1.2% depreciation per month of age, floored at 30% of new
        let car_value = round_to_cents(new_value * (1.0 - 0.012 * car_age_months).max(0.3));
        let car_mileage = (car_age_months * rng.gen_range(600.0..=1_400.0)) as u32;
        let finance_amount = round_to_cents(car_value * rng.gen_range(0.6..=0.95));

        SyntheticLoan {
            car_make: make.to_string(),
            car_value,
            car_age_months,
            car_mileage,
            finance_amount,
            flat_rate_percent: round_to_cents(rng.gen_range(2.0..=15.0)),
            term_months: CAR_LOAN_TERMS.choose(rng).copied().unwrap_or(48),
        }
    }
}

impl<R: Rng> SyntheticSource for RandomSyntheticSource<R> {
    fn fetch_synthetic_records(&mut self, count: usize) -> LoanResult<Vec<SyntheticLoan>> {
        Ok((0..count).map(|_| self.record()).collect())
    }
}

/// Tag synthetic records with fresh ids and contract date.
///
/// `existing` holds ids already stored; ids are unique across it and the batch.
pub fn assign_ids<R: Rng>(
    records: Vec<SyntheticLoan>,
    existing: &HashSet<String>,
    contract_date: NaiveDate,
    ids: &mut LoanIdGenerator<R>,
) -> LoanResult<Vec<GeneratedLoan>> {
    let new_ids = ids.generate_batch(records.len(), contract_date, existing)?;

    let loans = records
        .into_iter()
        .zip(new_ids)
        .map(|(record, id)| record.into_generated(id, contract_date))
        .collect::<LoanResult<Vec<_>>>()?;

    info!("Assigned ids to {} synthetic loans", loans.len());
    Ok(loans)
}
