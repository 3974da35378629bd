//! Effective APR solver
//!
//! Finds the actual/365 APR at which a loan's fixed payments exactly retire
//! its principal. The balance-vs-rate relation has no closed form once real
//! calendar periods are involved, so the root is bracketed and found with
//! Brent's method.

use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::accrual::{balance_after, periods};
use crate::error::{LoanError, LoanResult};

/// Lowest APR searched, in percent
pub const DEFAULT_LOWER_APR: f64 = 0.0;

/// Highest APR searched, in percent
pub const DEFAULT_UPPER_APR: f64 = 100.0;

/// Absolute tolerance on the APR
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Bracket and convergence settings for the rate search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub lower: f64,
    pub upper: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_APR,
            upper: DEFAULT_UPPER_APR,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Root and iteration count from a successful search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub value: f64,
    pub iterations: u32,
}

/// Brent's method on `[lower, upper]`.
///
/// Requires `f(lower)` and `f(upper)` to differ in sign. Converges when the
/// bracket is narrower than `tolerance` or `f` hits exactly zero.
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(f: F, lower: f64, upper: f64, tolerance: f64, max_iterations: u32) -> LoanResult<Root>
where
    F: Fn(f64) -> f64,
{
    let mut a = lower;
    let mut b = upper;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa == 0.0 {
        return Ok(Root { value: a, iterations: 0 });
    }
    if fb == 0.0 {
        return Ok(Root { value: b, iterations: 0 });
    }
    if fa.signum() == fb.signum() || fa.is_nan() || fb.is_nan() {
        return Err(LoanError::NoSignChange {
            lower,
            upper,
            f_lower: fa,
            f_upper: fb,
        });
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for iteration in 1..=max_iterations {
        // Keep the root between b and c
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }

        // b is always the best estimate
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance;
        let midpoint = 0.5 * (c - b);

        if midpoint.abs() <= tol || fb == 0.0 {
            return Ok(Root { value: b, iterations: iteration });
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant step
                (2.0 * midpoint * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * midpoint * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };

            if p > 0.0 {
                q = -q;
            }
            p = p.abs();

            let min1 = 3.0 * midpoint * q - (tol * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                // Interpolation rejected, bisect
                d = midpoint;
                e = d;
            }
        } else {
            d = midpoint;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(midpoint) };
        fb = f(b);
    }

    Err(LoanError::ConvergenceFailed {
        iterations: max_iterations,
        estimate: b,
    })
}

/// Outcome of a rate search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateSolution {
    /// APR (percent) that drives the final balance to zero
    Solved { apr: f64, iterations: u32 },

    /// No root found; the schedule is built at APR 0.0 and must be treated as suspect
    Fallback { reason: String },
}

impl RateSolution {
    /// APR used to build the schedule
    pub fn apr(&self) -> f64 {
        match self {
            RateSolution::Solved { apr, .. } => *apr,
            RateSolution::Fallback { .. } => 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RateSolution::Fallback { .. })
    }
}

/// Solve for the actual/365 APR of a fixed-payment loan.
///
/// Falls back to APR 0.0 when the bracket has no sign change (payment too
/// small to ever amortize, or so large the balance overshoots even at the
/// top of the range) or the iteration budget runs out.
pub fn solve_rate(
    principal: f64,
    fixed_payment: f64,
    start_date: NaiveDate,
    term_months: u32,
    config: &SolverConfig,
) -> LoanResult<RateSolution> {
    let periods = periods(start_date, term_months)?;
    let objective = |apr: f64| balance_after(apr, principal, fixed_payment, &periods);

    let solution = match brent(objective, config.lower, config.upper, config.tolerance, config.max_iterations) {
        Ok(root) => {
            debug!("Solved APR {:.6}% in {} iterations", root.value, root.iterations);
            RateSolution::Solved {
                apr: root.value,
                iterations: root.iterations,
            }
        }
        Err(err) => {
            warn!("Rate solver fell back to APR 0.0: {}", err);
            RateSolution::Fallback { reason: err.to_string() }
        }
    };

    Ok(solution)
}
