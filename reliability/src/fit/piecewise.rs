use super::{curve, FitFailure, FittedRangeModel, RangeFitter};
use crate::bins::Bin;
use log::debug;
use nalgebra::{Matrix3, Vector3};

/// Relative tolerances on the sum of squares and on the step size.
const DEFAULT_TOLERANCE: f64 = 1.49012e-8;
const DEFAULT_MAX_ITERATIONS: usize = 1000;

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;

/// Model parameters `[x0, y0, m]`.
type Params = Vector3<f64>;

/// Least-squares fit of
///
/// ```text
/// f(x) = y0                  x <  x0
/// f(x) = y0 + m * (x - x0)   x >= x0
/// ```
///
/// by Levenberg-Marquardt. `x0` is the maximum reliable range, `y0`
/// the near-range reliability and `m` the far-range slope.
#[derive(Debug, Clone, Copy)]
pub struct PiecewiseLinear {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for PiecewiseLinear {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl PiecewiseLinear {
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl RangeFitter for PiecewiseLinear {
    fn name(&self) -> &'static str {
        "piecewise-linear"
    }

    fn fit(&self, bins: &[Bin]) -> Result<FittedRangeModel, FitFailure> {
        let (xs, ys) = curve(bins)?;
        let p0 = initial_guess(&xs, &ys);
        if !p0.iter().all(|v| v.is_finite()) {
            return Err(FitFailure::NoConvergence(format!(
                "degenerate initial guess {:?}",
                p0.as_slice()
            )));
        }

        let p = self.minimize(p0, &xs, &ys)?;
        let (x0, y0, m) = (p[0], p[1], p[2]);
        Ok(FittedRangeModel {
            max_reliable_range: x0,
            near_range_reliability: Some(y0),
            far_range_slope: Some(m),
        })
    }
}

impl PiecewiseLinear {
    fn minimize(&self, p0: Params, xs: &[f64], ys: &[f64]) -> Result<Params, FitFailure> {
        let mut p = p0;
        let mut cost = sum_of_squares(&p, xs, ys);
        let mut damping = INITIAL_DAMPING;

        for iteration in 0..self.max_iterations {
            let (jtj, jtr) = normal_equations(&p, xs, ys);

            if jtr.amax() <= f64::EPSILON * f64::EPSILON {
                debug!("piecewise fit: zero gradient after {iteration} iterations");
                return Ok(p);
            }

            let mut accepted = false;
            while damping < MAX_DAMPING {
                let Some(step) = damped_step(&jtj, &jtr, damping) else {
                    damping *= 10.0;
                    continue;
                };
                let candidate = p + step;
                let candidate_cost = sum_of_squares(&candidate, xs, ys);

                if candidate_cost.is_finite() && candidate_cost <= cost {
                    let reduction = cost - candidate_cost;
                    let small_step = step.norm() <= self.tolerance * (p.norm() + self.tolerance);
                    let small_reduction = reduction <= self.tolerance * cost;
                    p = candidate;
                    cost = candidate_cost;
                    damping = (damping / 10.0).max(MIN_DAMPING);
                    accepted = true;
                    if small_step || small_reduction {
                        debug!(
                            "piecewise fit: converged after {iteration} iterations, sse {cost:e}"
                        );
                        return finite(p);
                    }
                    break;
                }
                damping *= 10.0;
            }

            if !accepted {
                // No downhill step exists at any damping: a local minimum
                // of the (non-smooth) objective.
                debug!("piecewise fit: stalled after {iteration} iterations, sse {cost:e}");
                return finite(p);
            }
        }

        Err(FitFailure::NoConvergence(format!(
            "no convergence within {} iterations",
            self.max_iterations
        )))
    }
}

/// `x0` at the mean distance, `y0` at the best observed reliability and
/// `m` the chord from there to the far end of the curve.
fn initial_guess(xs: &[f64], ys: &[f64]) -> Params {
    #[allow(clippy::cast_precision_loss)]
    let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    Params::new(mean_x, max_y, (min_y - max_y) / (max_x - mean_x))
}

fn model(p: &Params, x: f64) -> f64 {
    let (x0, y0, m) = (p[0], p[1], p[2]);
    if x < x0 {
        y0
    } else {
        y0 + m * (x - x0)
    }
}

/// Partial derivatives of `model` with respect to `[x0, y0, m]`.
fn gradient(p: &Params, x: f64) -> Vector3<f64> {
    let (x0, m) = (p[0], p[2]);
    if x < x0 {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(-m, 1.0, x - x0)
    }
}

fn sum_of_squares(p: &Params, xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| (y - model(p, x)).powi(2))
        .sum()
}

/// Returns `(JᵀJ, Jᵀr)` with `J` the model Jacobian and `r` the
/// residuals `y - f(x)`.
fn normal_equations(p: &Params, xs: &[f64], ys: &[f64]) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (&x, &y) in xs.iter().zip(ys) {
        let r = y - model(p, x);
        let j = gradient(p, x);
        jtj += j * j.transpose();
        jtr += j * r;
    }
    (jtj, jtr)
}

/// Solves `(JᵀJ + λ diag(JᵀJ)) δ = Jᵀr`, or `None` when the damped
/// system is not positive definite.
fn damped_step(jtj: &Matrix3<f64>, jtr: &Vector3<f64>, damping: f64) -> Option<Vector3<f64>> {
    let mut a = *jtj;
    for i in 0..3 {
        a[(i, i)] += damping * jtj[(i, i)].max(MIN_DAMPING);
    }
    let step = a.cholesky()?.solve(jtr);
    step.iter().all(|v| v.is_finite()).then_some(step)
}

fn finite(p: Params) -> Result<Params, FitFailure> {
    if p.iter().all(|v| v.is_finite()) {
        Ok(p)
    } else {
        Err(FitFailure::NoConvergence(format!(
            "non-finite parameters {:?}",
            p.as_slice()
        )))
    }
}
