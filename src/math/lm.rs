//! Bounded nonlinear least squares (Levenberg–Marquardt).
//!
//! Every fitting stage solves a problem of the form:
//!
//! ```text
//! minimize Σ (y_i - f(x_i; p))²   subject to  lower ≤ p ≤ upper
//! ```
//!
//! Each iteration builds the Jacobian `J` from the model's analytic gradient
//! rows and solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! The trial point `p + δ` is projected onto the box. A trial that lowers the
//! cost is accepted and `λ` shrinks; otherwise `λ` grows and the step is retried.
//!
//! Termination:
//! - converged when the relative cost decrease or the step length drops below
//!   tolerance, or the cost is numerically zero
//! - converged when no damped step can lower the cost (projected stationary point)
//! - `NotConverged` when the iteration budget runs out first

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::solve_svd;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Floor on the Marquardt scaling so parameters with vanishing columns still get damped.
const DIAG_FLOOR: f64 = 1e-12;
/// Cost per point below which the fit is treated as exact.
const EXACT_COST_PER_POINT: f64 = 1e-30;

/// A curve `y = f(x; p)` that the solver can fit.
///
/// Implementations must write exactly `n_params()` entries into `out`.
pub trait CurveModel {
    fn n_params(&self) -> usize;

    fn eval(&self, x: f64, p: &[f64]) -> f64;

    /// Partial derivatives of `eval` with respect to each parameter.
    fn fill_gradient(&self, x: f64, p: &[f64], out: &mut [f64]);
}

/// Box constraints on the parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Append another block of bounds (used to stack aperiodic + peak bounds).
    pub fn extend(&mut self, other: &Bounds) {
        self.lower.extend_from_slice(&other.lower);
        self.upper.extend_from_slice(&other.upper);
    }

    pub fn project(&self, p: &mut [f64]) {
        for ((v, &lo), &hi) in p.iter_mut().zip(self.lower.iter()).zip(self.upper.iter()) {
            *v = v.clamp(lo, hi);
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost decrease below which the fit has converged.
    pub ftol: f64,
    /// Relative step length below which the fit has converged.
    pub xtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            ftol: 1e-8,
            xtol: 1e-8,
        }
    }
}

impl LmOptions {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }
}

/// A converged solution.
#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("solver did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("model is not finite at the initial guess")]
    NonFinite,
    #[error("{n_points} points cannot determine {n_params} parameters")]
    Underdetermined { n_points: usize, n_params: usize },
    #[error("dimension mismatch: {0}")]
    Dimension(String),
}

impl SolveError {
    /// Iterations spent before the failure (0 when the solve never started).
    pub fn iterations(&self) -> usize {
        match self {
            SolveError::NotConverged { iterations } => *iterations,
            _ => 0,
        }
    }
}

/// Fit `model` to `(x, y)` starting from `p0`.
pub fn fit_curve<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    bounds: &Bounds,
    opts: &LmOptions,
) -> Result<LmSolution, SolveError> {
    let m = model.n_params();
    let n = x.len();
    if y.len() != n {
        return Err(SolveError::Dimension(format!("x has {n} points, y has {}", y.len())));
    }
    if p0.len() != m || bounds.len() != m {
        return Err(SolveError::Dimension(format!(
            "model has {m} parameters, guess has {}, bounds have {}",
            p0.len(),
            bounds.len()
        )));
    }
    if n < m {
        return Err(SolveError::Underdetermined {
            n_points: n,
            n_params: m,
        });
    }

    let mut p = p0.to_vec();
    bounds.project(&mut p);

    let mut cost = sse(model, x, y, &p);
    if !cost.is_finite() {
        return Err(SolveError::NonFinite);
    }
    let exact_cost = EXACT_COST_PER_POINT * n as f64;
    if cost <= exact_cost {
        return Ok(LmSolution {
            params: p,
            cost,
            iterations: 0,
        });
    }

    let mut lambda = LAMBDA_INIT;
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut r = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; m];

    for iter in 1..=opts.max_iterations {
        for i in 0..n {
            model.fill_gradient(x[i], &p, &mut row);
            for j in 0..m {
                jac[(i, j)] = row[j];
            }
            r[i] = y[i] - model.eval(x[i], &p);
        }
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let grad = &jt * &r;

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for j in 0..m {
                damped[(j, j)] += lambda * jtj[(j, j)].max(DIAG_FLOOR);
            }

            let Some(delta) = solve_damped(damped, &grad) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            bounds.project(&mut trial);
            let trial_cost = sse(model, x, y, &trial);

            if trial_cost.is_finite() && trial_cost < cost {
                let step = p
                    .iter()
                    .zip(trial.iter())
                    .map(|(a, b)| (b - a) * (b - a))
                    .sum::<f64>()
                    .sqrt();
                let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                let rel_decrease = (cost - trial_cost) / cost;

                p = trial;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if cost <= exact_cost
                    || rel_decrease <= opts.ftol
                    || step <= opts.xtol * (p_norm + opts.xtol)
                {
                    return Ok(LmSolution {
                        params: p,
                        cost,
                        iterations: iter,
                    });
                }
                accepted = true;
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No damped step lowers the cost: we are at a (projected) minimum.
            return Ok(LmSolution {
                params: p,
                cost,
                iterations: iter,
            });
        }
    }

    Err(SolveError::NotConverged {
        iterations: opts.max_iterations,
    })
}

/// Sum of squared residuals; `INFINITY` if any model value is non-finite.
pub fn sse<M: CurveModel>(model: &M, x: &[f64], y: &[f64], p: &[f64]) -> f64 {
    let mut total = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let r = yi - model.eval(xi, p);
        if !r.is_finite() {
            return f64::INFINITY;
        }
        total += r * r;
    }
    total
}

/// Step for the damped normal equations. Cholesky first, SVD when the
/// matrix is not numerically positive definite.
fn solve_damped(damped: DMatrix<f64>, grad: &DVector<f64>) -> Option<DVector<f64>> {
    let delta = match damped.clone().cholesky() {
        Some(chol) => chol.solve(grad),
        None => solve_svd(&damped, grad)?,
    };
    if delta.iter().all(|v| v.is_finite()) {
        Some(delta)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = a · exp(-b·x)`
    struct ExpDecay;

    impl CurveModel for ExpDecay {
        fn n_params(&self) -> usize {
            2
        }

        fn eval(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (-p[1] * x).exp()
        }

        fn fill_gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (-p[1] * x).exp();
            out[0] = e;
            out[1] = -p[0] * x * e;
        }
    }

    fn decay_data(a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y = x.iter().map(|&xi| a * (-b * xi).exp()).collect();
        (x, y)
    }

    #[test]
    fn recovers_exact_parameters() {
        let (x, y) = decay_data(3.0, 0.7);
        let sol = fit_curve(
            &ExpDecay,
            &x,
            &y,
            &[1.0, 0.1],
            &Bounds::unbounded(2),
            &LmOptions::default(),
        )
        .unwrap();
        assert!((sol.params[0] - 3.0).abs() < 1e-6, "a = {}", sol.params[0]);
        assert!((sol.params[1] - 0.7).abs() < 1e-6, "b = {}", sol.params[1]);
    }

    #[test]
    fn respects_bounds() {
        let (x, y) = decay_data(3.0, 0.7);
        let bounds = Bounds {
            lower: vec![f64::NEG_INFINITY, 1.0],
            upper: vec![f64::INFINITY, 2.0],
        };
        let sol = fit_curve(&ExpDecay, &x, &y, &[1.0, 1.5], &bounds, &LmOptions::default()).unwrap();
        assert!(sol.params[1] >= 1.0 && sol.params[1] <= 2.0);
        assert!((sol.params[1] - 1.0).abs() < 1e-9, "decay should sit on its lower bound");
    }

    #[test]
    fn reports_underdetermined_problems() {
        let err = fit_curve(
            &ExpDecay,
            &[1.0],
            &[1.0],
            &[1.0, 1.0],
            &Bounds::unbounded(2),
            &LmOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SolveError::Underdetermined { .. }));
    }

    #[test]
    fn exhausting_the_budget_is_an_error() {
        let (x, y) = decay_data(3.0, 0.7);
        let err = fit_curve(
            &ExpDecay,
            &x,
            &y,
            &[1.0, 0.1],
            &Bounds::unbounded(2),
            &LmOptions::with_max_iterations(1),
        )
        .unwrap_err();
        assert_eq!(err, SolveError::NotConverged { iterations: 1 });
    }
}
