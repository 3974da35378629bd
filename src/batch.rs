//! Batch reconciliation over a loan source
//!
//! Each loan is reconciled on its own. A loan that cannot be reconciled is
//! reported as skipped and never aborts the batch; only source and sink I/O
//! errors propagate out of [`BatchRunner::run`].

use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ReconcileConfig;
use crate::error::LoanResult;
use crate::loan::LoanInput;
use crate::schedule::{ClosureAnomaly, ReconciledSchedule, ScheduleReconciler, ScheduleRow};
use crate::storage::{LoanSource, ScheduleSink};

/// Why a reconciled loan was flagged for review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Scheduled interest differs from the flat-rate target by more than the threshold
    InterestMismatch,
    /// No APR root in the search bracket, schedule accrued at 0%
    SolverFallback,
    /// Final period repays negative principal
    NegativeFinalPrincipal,
}

/// A reconciled loan flagged for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub loan_id: String,
    pub target_interest: f64,
    pub actual_interest: f64,
    pub kind: DiscrepancyKind,
}

/// A loan left out of the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skipped {
    pub loan_id: String,
    pub reason: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Schedule rows of every reconciled loan, in input order
    pub rows: Vec<ScheduleRow>,
    pub discrepancies: Vec<Discrepancy>,
    pub skipped: Vec<Skipped>,
    pub loans_reconciled: usize,
}

impl BatchReport {
    fn record(&mut self, schedule: ReconciledSchedule, threshold: f64) {
        let (target_interest, actual_interest) = schedule.interest_check();
        let flag = |kind| Discrepancy {
            loan_id: schedule.loan_id.clone(),
            target_interest,
            actual_interest,
            kind,
        };

        if schedule.interest_discrepancy() > threshold {
            self.discrepancies.push(flag(DiscrepancyKind::InterestMismatch));
        }
        if schedule.rate.is_fallback() {
            self.discrepancies.push(flag(DiscrepancyKind::SolverFallback));
        }
        for anomaly in &schedule.anomalies {
            match anomaly {
                ClosureAnomaly::NegativeFinalPrincipal { .. } => {
                    self.discrepancies.push(flag(DiscrepancyKind::NegativeFinalPrincipal));
                }
            }
        }

        self.loans_reconciled += 1;
        self.rows.extend(schedule.rows);
    }

    /// Discrepancies of one kind
    pub fn discrepancies_of(&self, kind: DiscrepancyKind) -> impl Iterator<Item = &Discrepancy> {
        self.discrepancies.iter().filter(move |d| d.kind == kind)
    }
}

/// Reconciles every loan from a source and writes the schedule to a sink
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: ReconcileConfig,
    reconciler: ScheduleReconciler,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

impl BatchRunner {
    pub fn new(config: ReconcileConfig) -> Self {
        let reconciler = ScheduleReconciler::new(config.solver);
        Self { config, reconciler }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Read all loans, reconcile them and replace the sink's schedule.
    /// Source rows that fail to parse are reported as skipped after the
    /// loans that were read.
    pub fn run<S, K>(&self, source: &S, sink: &mut K, run_date: NaiveDate) -> LoanResult<BatchReport>
    where
        S: LoanSource + ?Sized,
        K: ScheduleSink + ?Sized,
    {
        let source_rows = source.read_loan_rows()?;
        info!(
            "Read {} loans ({} rows rejected)",
            source_rows.loans.len(),
            source_rows.rejected.len()
        );

        let mut report = self.reconcile_inputs(&source_rows.loans, run_date);
        report.skipped.extend(source_rows.rejected.into_iter().map(|row| Skipped {
            loan_id: row.loan_id.unwrap_or_else(|| format!("line {}", row.line)),
            reason: row.reason,
        }));
        sink.write_schedule(&report.rows)?;

        info!(
            "Reconciled {} loans ({} rows), {} skipped, {} discrepancies",
            report.loans_reconciled,
            report.rows.len(),
            report.skipped.len(),
            report.discrepancies.len()
        );
        Ok(report)
    }

    /// Reconcile already-loaded inputs without touching any storage
    pub fn reconcile_inputs(&self, inputs: &[LoanInput], run_date: NaiveDate) -> BatchReport {
        let outcomes: Vec<Result<ReconciledSchedule, Skipped>> = if self.config.parallel {
            inputs.par_iter().map(|input| self.reconcile_one(input, run_date)).collect()
        } else {
            inputs.iter().map(|input| self.reconcile_one(input, run_date)).collect()
        };

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(schedule) => report.record(schedule, self.config.discrepancy_threshold),
                Err(skip) => report.skipped.push(skip),
            }
        }

        for d in &report.discrepancies {
            warn!(
                "Loan {}: {:?} (target interest {:.2}, scheduled {:.2})",
                d.loan_id, d.kind, d.target_interest, d.actual_interest
            );
        }

        report
    }

    fn reconcile_one(&self, input: &LoanInput, run_date: NaiveDate) -> Result<ReconciledSchedule, Skipped> {
        let skip = |reason: String| {
            warn!("Skipping loan {}: {}", input.loan_id, reason);
            Skipped {
                loan_id: input.loan_id.clone(),
                reason,
            }
        };

        if !input.has_payment() && !self.config.derive_missing_payment {
            return Err(skip("missing monthly repayment".to_string()));
        }

        let record = input
            .to_record(run_date, self.config.derive_missing_payment)
            .map_err(|e| skip(e.to_string()))?;

        self.reconciler.reconcile(&record).map_err(|e| skip(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LoanRows, MemoryStore, RejectedRow};
    use approx::assert_relative_eq;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn input(id: &str, principal: f64, term: u32, payment: Option<f64>, rate: f64) -> LoanInput {
        LoanInput {
            loan_id: id.to_string(),
            principal,
            term_months: term,
            monthly_payment: payment,
            flat_rate: rate,
            contract_date: Some("2024-01-15".to_string()),
        }
    }

    fn mixed_inputs() -> Vec<LoanInput> {
        vec![
            input("LOAN-A", 20_000.0, 36, Some(655.56), 6.0),
            input("LOAN-B", 15_500.0, 60, None, 4.5),
            input("LOAN-C", 9_000.0, 0, Some(412.5), 5.0),
            input("LOAN-D", 10_000.0, 12, Some(100.0), 5.0),
            input("LOAN-E", 8_750.0, 24, Some(434.53), 9.5),
        ]
    }

    #[test]
    fn test_batch_skips_and_flags() {
        let report = BatchRunner::default().reconcile_inputs(&mixed_inputs(), run_date());

        assert_eq!(report.loans_reconciled, 3);
        assert_eq!(report.rows.len(), 36 + 12 + 24);

        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.loan_id.as_str()).collect();
        assert_eq!(skipped, vec!["LOAN-B", "LOAN-C"]);
        assert_eq!(report.skipped[0].reason, "missing monthly repayment");

        let fallbacks: Vec<_> = report.discrepancies_of(DiscrepancyKind::SolverFallback).collect();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].loan_id, "LOAN-D");
        assert_relative_eq!(fallbacks[0].target_interest, 500.0);
        assert_eq!(report.discrepancies_of(DiscrepancyKind::InterestMismatch).count(), 0);
    }

    #[test]
    fn test_rows_keep_input_order() {
        let report = BatchRunner::default().reconcile_inputs(&mixed_inputs(), run_date());
        let mut ids: Vec<&str> = report.rows.iter().map(|r| r.loan_id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids, vec!["LOAN-A", "LOAN-D", "LOAN-E"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = BatchRunner::default().reconcile_inputs(&mixed_inputs(), run_date());
        let parallel = BatchRunner::new(ReconcileConfig {
            parallel: true,
            ..Default::default()
        })
        .reconcile_inputs(&mixed_inputs(), run_date());

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_derive_missing_payment() {
        let runner = BatchRunner::new(ReconcileConfig {
            derive_missing_payment: true,
            ..Default::default()
        });
        let report = runner.reconcile_inputs(&mixed_inputs(), run_date());

        assert_eq!(report.loans_reconciled, 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].loan_id, "LOAN-C");
    }

    #[test]
    fn test_out_of_range_term_is_skipped() {
        let inputs = vec![
            input("LOAN-OK", 20_000.0, 36, Some(655.56), 6.0),
            input("LOAN-HUGE", 20_000.0, 4_000_000_000, Some(655.56), 6.0),
            input("LOAN-HUGE-DERIVED", 20_000.0, u32::MAX, None, 6.0),
        ];
        let runner = BatchRunner::new(ReconcileConfig {
            derive_missing_payment: true,
            ..Default::default()
        });
        let report = runner.reconcile_inputs(&inputs, run_date());

        assert_eq!(report.loans_reconciled, 1);
        assert_eq!(report.rows.len(), 36);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.loan_id.as_str()).collect();
        assert_eq!(skipped, vec!["LOAN-HUGE", "LOAN-HUGE-DERIVED"]);
        assert!(report.skipped.iter().all(|s| s.reason.contains("term_months")));
    }

    #[test]
    fn test_negative_final_principal_is_flagged() {
        let inputs = vec![input("LOAN-X", 1_000.0, 12, Some(200.0), 5.0)];
        let report = BatchRunner::default().reconcile_inputs(&inputs, run_date());

        assert_eq!(report.discrepancies_of(DiscrepancyKind::NegativeFinalPrincipal).count(), 1);
    }

    struct PartlyUnreadable;

    impl LoanSource for PartlyUnreadable {
        fn read_loans(&self) -> LoanResult<Vec<LoanInput>> {
            Ok(vec![input("LOAN-A", 20_000.0, 36, Some(655.56), 6.0)])
        }

        fn read_loan_rows(&self) -> LoanResult<LoanRows> {
            Ok(LoanRows {
                loans: self.read_loans()?,
                rejected: vec![RejectedRow {
                    line: 4,
                    loan_id: None,
                    reason: "found record with 3 fields, but the previous record has 6 fields".to_string(),
                }],
            })
        }
    }

    #[test]
    fn test_rejected_source_rows_are_skipped() {
        let mut sink = MemoryStore::default();
        let report = BatchRunner::default().run(&PartlyUnreadable, &mut sink, run_date()).unwrap();

        assert_eq!(report.loans_reconciled, 1);
        assert_eq!(sink.schedule.len(), 36);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].loan_id, "line 4");
    }

    #[test]
    fn test_run_replaces_sink_contents() {
        let mut store = MemoryStore::with_loans(mixed_inputs());
        let runner = BatchRunner::default();

        let first = runner.run(&store.clone(), &mut store, run_date()).unwrap();
        let second = runner.run(&store.clone(), &mut store, run_date()).unwrap();

        assert_eq!(store.writes, 2);
        assert_eq!(store.schedule.len(), first.rows.len());
        assert_eq!(first, second);
    }
}
