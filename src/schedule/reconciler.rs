//! Flat-rate to day-count schedule reconciliation

use log::{debug, warn};

use super::accrual::{daily_rate, periods, Period};
use super::rows::{ClosureAnomaly, ReconciledSchedule, ReconciliationTarget, ScheduleRow};
use super::solver::{solve_rate, SolverConfig};
use super::state::{Phase, ReconcileState};
use super::{round_to, round_to_cents};
use crate::error::LoanResult;
use crate::loan::LoanRecord;

/// Decimal places kept on the reported APR
const APR_DECIMALS: i32 = 6;

/// Builds reconciled payment schedules for individual loans.
///
/// Standard months accrue interest at the solved actual/365 APR and are
/// rounded to cents as they are emitted. The final month is not accrued.
/// Its interest and repayment are whatever remains of the contract totals,
/// so the columns sum to the targets by construction.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReconciler {
    solver: SolverConfig,
}

impl ScheduleReconciler {
    pub fn new(solver: SolverConfig) -> Self {
        Self { solver }
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver
    }

    /// Reconcile one loan. Deterministic for a given record and solver config.
    pub fn reconcile(&self, loan: &LoanRecord) -> LoanResult<ReconciledSchedule> {
        let target = ReconciliationTarget::from_flat_rate(loan.principal(), loan.apr(), loan.term_months());

        let rate = solve_rate(
            loan.principal(),
            loan.monthly_payment(),
            loan.start_date(),
            loan.term_months(),
            &self.solver,
        )?;
        let apr = rate.apr();
        let reported_apr = round_to(apr, APR_DECIMALS);

        let mut state = ReconcileState::new(loan.principal(), loan.term_months());
        let mut rows = Vec::with_capacity(loan.term_months() as usize);
        let mut anomalies = Vec::new();
        let mut closure_residual = 0.0;

        for period in periods(loan.start_date(), loan.term_months())? {
            let opening_balance = state.balance;

            let (interest, repayment, closing_balance) = match state.next_phase() {
                Phase::Accruing => self.accrue_period(loan, apr, opening_balance, &period),
                Phase::Closing => {
                    let interest = round_to_cents(target.total_interest - state.sum_interest);
                    let repayment = round_to_cents(target.total_payable - state.sum_repayment);
                    let principal_portion = repayment - interest;
                    closure_residual = opening_balance - principal_portion;

                    if principal_portion < 0.0 {
                        warn!(
                            "Loan {}: final period principal portion is negative ({:.2})",
                            loan.id(),
                            principal_portion
                        );
                        anomalies.push(ClosureAnomaly::NegativeFinalPrincipal { principal_portion });
                    }

                    (interest, repayment, 0.0)
                }
            };

            rows.push(ScheduleRow {
                loan_id: loan.id().to_string(),
                period: period.number,
                payment_date: period.end_date,
                days_in_period: period.days,
                nominal_apr: reported_apr,
                opening_balance,
                interest_amount: interest,
                repayment_amount: repayment,
                closing_balance,
            });

            state.advance(interest, repayment, closing_balance);
        }

        debug!(
            "Loan {}: {} periods at {:.6}%, interest {:.2} / target {:.2}, closure residual {:.2}",
            loan.id(),
            rows.len(),
            apr,
            state.sum_interest,
            target.total_interest,
            closure_residual
        );

        Ok(ReconciledSchedule {
            loan_id: loan.id().to_string(),
            target,
            rate,
            rows,
            actual_total_interest: state.sum_interest,
            actual_total_payable: state.sum_repayment,
            closure_residual,
            anomalies,
        })
    }

    /// Interest, repayment and closing balance for a standard month.
    /// Interest is rounded here so the running totals match the emitted rows.
    fn accrue_period(&self, loan: &LoanRecord, apr: f64, opening_balance: f64, period: &Period) -> (f64, f64, f64) {
        let interest = round_to_cents(opening_balance * daily_rate(apr) * period.days as f64);
        let repayment = loan.monthly_payment();
        let principal_portion = repayment - interest;
        let closing_balance = round_to_cents(opening_balance - principal_portion);

        (interest, repayment, closing_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn reconcile(principal: f64, flat_rate: f64, term: u32, payment: f64) -> ReconciledSchedule {
        let loan = LoanRecord::new("LOAN-240115-0001", principal, flat_rate, term, start(), payment).unwrap();
        ScheduleReconciler::default().reconcile(&loan).unwrap()
    }

    fn column_sums(schedule: &ReconciledSchedule) -> (f64, f64) {
        let interest: f64 = schedule.rows.iter().map(|r| r.interest_amount).sum();
        let repayment: f64 = schedule.rows.iter().map(|r| r.repayment_amount).sum();
        (interest, repayment)
    }

    #[test]
    fn test_flat_rate_scenario_matches_targets() {
        let schedule = reconcile(20_000.0, 6.0, 36, 655.56);

        assert_eq!(schedule.target.total_interest, 3_600.0);
        assert_eq!(schedule.target.total_payable, 23_600.0);
        assert_eq!(schedule.rows.len(), 36);
        assert!(!schedule.rate.is_fallback());
        assert!(schedule.anomalies.is_empty());

        let (interest, repayment) = column_sums(&schedule);
        assert!((interest - 3_600.0).abs() < 1e-6, "interest {}", interest);
        assert!((repayment - 23_600.0).abs() < 1e-6, "repayment {}", repayment);
        assert!(schedule.interest_discrepancy() < 0.01);

        // Solved rate lands the running balance on the final repayment
        let last = schedule.final_row().unwrap();
        assert_eq!(last.repayment_amount, 655.4);
        assert!(schedule.closure_residual.abs() < 0.05);
    }

    #[test]
    fn test_balances_chain_and_close() {
        let schedule = reconcile(8_750.0, 9.5, 24, 434.53);

        assert_eq!(schedule.rows[0].opening_balance, 8_750.0);
        for pair in schedule.rows.windows(2) {
            assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
            assert_eq!(pair[1].period, pair[0].period + 1);
        }
        assert_eq!(schedule.final_row().unwrap().closing_balance, 0.0);
    }

    #[test]
    fn test_standard_months_use_day_count() {
        let schedule = reconcile(20_000.0, 6.0, 36, 655.56);
        let apr = schedule.rate.apr();
        let first = &schedule.rows[0];

        // Jan 15 -> Feb 15
        assert_eq!(first.days_in_period, 31);
        assert_eq!(first.payment_date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert_eq!(first.interest_amount, round_to_cents(20_000.0 * daily_rate(apr) * 31.0));
        assert_eq!(first.repayment_amount, 655.56);
        assert_eq!(first.nominal_apr, round_to(apr, 6));
        assert_eq!(schedule.rows[1].days_in_period, 29);
    }

    #[test]
    fn test_single_period_loan() {
        let schedule = reconcile(5_000.0, 8.0, 1, 5_033.33);

        assert_eq!(schedule.rows.len(), 1);
        let row = &schedule.rows[0];
        assert_eq!(row.opening_balance, 5_000.0);
        assert_eq!(row.interest_amount, 33.33);
        assert_eq!(row.repayment_amount, 5_033.33);
        assert_eq!(row.closing_balance, 0.0);
        assert_eq!(schedule.actual_total_interest, schedule.target.total_interest);
        assert_eq!(schedule.actual_total_payable, schedule.target.total_payable);
    }

    #[test]
    fn test_payment_too_low_falls_back_to_zero_rate() {
        let schedule = reconcile(10_000.0, 5.0, 12, 100.0);

        assert!(schedule.rate.is_fallback());
        assert_eq!(schedule.rows[0].nominal_apr, 0.0);
        assert!(schedule.rows[..11].iter().all(|r| r.interest_amount == 0.0));

        // Closure still forces the totals
        let (interest, repayment) = column_sums(&schedule);
        assert!((interest - 500.0).abs() < 1e-6);
        assert!((repayment - 10_500.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_final_principal_is_flagged() {
        // Payments far above the contract total overshoot before the final month
        let schedule = reconcile(1_000.0, 5.0, 12, 200.0);

        assert_eq!(schedule.anomalies.len(), 1);
        match &schedule.anomalies[0] {
            ClosureAnomaly::NegativeFinalPrincipal { principal_portion } => {
                assert!((principal_portion + 1_200.0).abs() < 1e-6);
            }
        }
        assert_eq!(schedule.final_row().unwrap().closing_balance, 0.0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let first = reconcile(14_200.0, 7.9, 48, 389.15);
        let second = reconcile(14_200.0, 7.9, 48, 389.15);
        assert_eq!(first, second);
    }
}
