//! Reconciliation run configuration
//!
//! Defaults can be overridden from the environment:
//!   RECONCILE_TOLERANCE, RECONCILE_MAX_ITERATIONS, RECONCILE_LOWER_APR,
//!   RECONCILE_UPPER_APR, RECONCILE_DISCREPANCY_THRESHOLD,
//!   RECONCILE_DERIVE_PAYMENT, RECONCILE_PARALLEL

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schedule::SolverConfig;

/// Interest gap above which a loan is reported as a discrepancy
pub const DEFAULT_DISCREPANCY_THRESHOLD: f64 = 0.01;

/// Configuration for a batch reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Bracket and tolerance for the APR search
    pub solver: SolverConfig,

    /// Absolute interest discrepancy that triggers a report
    pub discrepancy_threshold: f64,

    /// Compute missing repayments from the flat rate instead of skipping the loan
    pub derive_missing_payment: bool,

    /// Reconcile loans on the rayon thread pool
    pub parallel: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            discrepancy_threshold: DEFAULT_DISCREPANCY_THRESHOLD,
            derive_missing_payment: false,
            parallel: false,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl ReconcileConfig {
    /// Defaults overridden by any `RECONCILE_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            solver: SolverConfig {
                lower: env_or("RECONCILE_LOWER_APR", defaults.solver.lower),
                upper: env_or("RECONCILE_UPPER_APR", defaults.solver.upper),
                tolerance: env_or("RECONCILE_TOLERANCE", defaults.solver.tolerance),
                max_iterations: env_or("RECONCILE_MAX_ITERATIONS", defaults.solver.max_iterations),
            },
            discrepancy_threshold: env_or("RECONCILE_DISCREPANCY_THRESHOLD", defaults.discrepancy_threshold),
            derive_missing_payment: env_flag("RECONCILE_DERIVE_PAYMENT", defaults.derive_missing_payment),
            parallel: env_flag("RECONCILE_PARALLEL", defaults.parallel),
        }
    }
}
