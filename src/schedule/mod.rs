//! Payment formulas, day-count accrual, rate solving and schedule reconciliation

pub mod accrual;
mod payment;
mod reconciler;
mod rows;
pub mod solver;
mod state;

pub use accrual::{final_balance, Period};
pub use payment::{amortization_schedule, payment, AmortizationRow, FlatRateTerms};
pub use reconciler::ScheduleReconciler;
pub use rows::{ClosureAnomaly, ReconciledSchedule, ReconciliationTarget, ScheduleRow};
pub use solver::{solve_rate, RateSolution, SolverConfig};
pub use state::{Phase, ReconcileState};

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Round to whole cents
pub fn round_to_cents(value: f64) -> f64 {
    round_to(value, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(655.555_555), 655.56);
        assert_eq!(round_to_cents(-0.004), 0.0);
        assert_eq!(round_to_cents(1_342.591_612_5), 1_342.59);
        assert_eq!(round_to(11.079_455_617, 6), 11.079_456);
    }
}
