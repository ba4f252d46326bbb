//! Bounded Levenberg–Marquardt least squares with a forward-difference Jacobian.

use std::fmt;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::FitError;

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e10;
/// Relative cost decrease below which the fit is converged.
const COST_TOLERANCE: f64 = 1e-10;
/// Largest coordinate change below which the fit is converged.
const STEP_TOLERANCE: f64 = 1e-10;
/// Relative forward-difference step.
const JACOBIAN_STEP: f64 = 1e-6;
/// Cost treated as an exact fit.
const EXACT_COST: f64 = 1e-30;

/// Why the optimiser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cost or step changes fell below tolerance.
    Converged,
    /// The iteration limit was reached.
    IterationLimit,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// No step from the initial guess decreased the cost.
    NoDecrease,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converged => "converged",
            Self::IterationLimit => "iteration limit reached",
            Self::TimeBudget => "time budget exhausted",
            Self::NoDecrease => "no step decreased the cost",
        })
    }
}

/// Iteration limit and the absolute wall-clock deadline shared by every
/// optimiser run of one fit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LmSettings {
    pub(crate) max_iterations: usize,
    pub(crate) deadline: Option<Instant>,
}

impl LmSettings {
    pub(crate) fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Best iterate and its local linearisation.
#[derive(Debug, Clone)]
pub(crate) struct LmOutcome {
    pub(crate) theta: Vec<f64>,
    pub(crate) residuals: DVector<f64>,
    /// Jacobian at `theta`, one row per residual and one column per coordinate.
    pub(crate) jacobian: DMatrix<f64>,
    pub(crate) iterations: usize,
    pub(crate) stop: StopReason,
}

fn clamp_into(theta: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((t, lo), hi) in theta.iter_mut().zip(lower).zip(upper) {
        *t = t.clamp(*lo, *hi);
    }
}

/// Forward differences, stepping backwards at an upper bound. A coordinate
/// whose perturbation cannot be evaluated gets a zero column.
fn jacobian<F>(
    f: &F,
    theta: &[f64],
    base: &DVector<f64>,
    upper: &[f64],
) -> Result<DMatrix<f64>, FitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FitError>,
{
    let mut jac = DMatrix::zeros(base.len(), theta.len());
    for i in 0..theta.len() {
        let mut h = JACOBIAN_STEP * theta[i].abs().max(1.0);
        if theta[i] + h > upper[i] {
            h = -h;
        }
        let mut shifted = theta.to_vec();
        shifted[i] += h;
        match f(&shifted) {
            Ok(r) => jac.set_column(i, &((DVector::from_vec(r) - base) / h)),
            Err(FitError::Model(e)) => {
                debug!(coordinate = i, error = %e, "jacobian column unavailable");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(jac)
}

/// Solve the damped normal equations `(JᵀJ + μ diag(JᵀJ)) δ = −Jᵀr` by LU.
fn damped_step(jtj: &DMatrix<f64>, rhs: &DVector<f64>, damping: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += damping * jtj[(i, i)].max(1e-12);
    }
    a.lu().solve(rhs).filter(|step| step.iter().all(|v| v.is_finite()))
}

/// Minimise `Σ f(θ)²` over the box `[lower, upper]`.
///
/// Damping is scaled by the diagonal of `JᵀJ` and moves by factors of ten.
/// Trial points that fail to evaluate count as rejected steps.
///
/// # Errors
///
/// Propagates the error of evaluating `f` at the (clamped) starting point.
pub(crate) fn levenberg_marquardt<F>(
    f: F,
    theta0: Vec<f64>,
    lower: &[f64],
    upper: &[f64],
    settings: LmSettings,
) -> Result<LmOutcome, FitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FitError>,
{
    let mut theta = theta0;
    clamp_into(&mut theta, lower, upper);
    let mut residuals = DVector::from_vec(f(&theta)?);
    let mut cost = residuals.norm_squared();
    let mut jac = jacobian(&f, &theta, &residuals, upper)?;
    let mut damping = INITIAL_DAMPING;
    let mut accepted = 0usize;
    let mut iterations = 0usize;

    let stop = loop {
        if iterations >= settings.max_iterations {
            break StopReason::IterationLimit;
        }
        if settings.expired() {
            break StopReason::TimeBudget;
        }
        iterations += 1;

        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let rhs = -(&jt * &residuals);
        let mut step_taken = None;
        while damping <= MAX_DAMPING {
            if let Some(step) = damped_step(&jtj, &rhs, damping) {
                let mut trial: Vec<f64> =
                    theta.iter().zip(step.iter()).map(|(t, s)| t + s).collect();
                clamp_into(&mut trial, lower, upper);
                match f(&trial) {
                    Ok(r) => {
                        let r = DVector::from_vec(r);
                        if r.norm_squared() < cost {
                            step_taken = Some((trial, r));
                            damping = (damping / 10.0).max(MIN_DAMPING);
                            break;
                        }
                    }
                    Err(FitError::Model(e)) => debug!(error = %e, "trial step rejected"),
                    Err(e) => return Err(e),
                }
            }
            damping *= 10.0;
        }

        let Some((trial, r)) = step_taken else {
            break if accepted > 0 || cost < EXACT_COST {
                StopReason::Converged
            } else {
                StopReason::NoDecrease
            };
        };
        let new_cost = r.norm_squared();
        let relative = (cost - new_cost) / cost;
        let step_size = theta
            .iter()
            .zip(&trial)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        theta = trial;
        residuals = r;
        cost = new_cost;
        accepted += 1;
        jac = jacobian(&f, &theta, &residuals, upper)?;
        debug!(iteration = iterations, cost, damping, "step accepted");

        if relative < COST_TOLERANCE || step_size < STEP_TOLERANCE {
            break StopReason::Converged;
        }
    };

    Ok(LmOutcome {
        theta,
        residuals,
        jacobian: jac,
        iterations,
        stop,
    })
}
