use std::collections::VecDeque;

use num_traits::Float;
use tracing::{debug, trace};

use crate::convergence::{dot, norm, ConvergenceParams};
use crate::error::OptimError;
use crate::line_search::{strong_wolfe, WolfeParams};
use crate::objective::Objective;
use crate::result::{OptimResult, TerminationReason};

/// Configuration for the L-BFGS solver.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LbfgsConfig<F> {
    /// Number of recent (s, y) pairs to store (default: 30).
    pub memory: usize,
    /// Convergence parameters.
    pub convergence: ConvergenceParams<F>,
    /// Line search parameters.
    pub line_search: WolfeParams<F>,
}

impl Default for LbfgsConfig<f64> {
    fn default() -> Self {
        LbfgsConfig {
            memory: 30,
            convergence: ConvergenceParams::default(),
            line_search: WolfeParams::default(),
        }
    }
}

impl Default for LbfgsConfig<f32> {
    fn default() -> Self {
        LbfgsConfig {
            memory: 30,
            convergence: ConvergenceParams::default(),
            line_search: WolfeParams::default(),
        }
    }
}

/// One curvature pair `s = x_{k+1} - x_k`, `y = g_{k+1} - g_k`, with
/// `rho = 1 / s^T y`.
struct Correction<F> {
    s: Vec<F>,
    y: Vec<F>,
    rho: F,
}

/// L-BFGS optimization.
///
/// Minimizes `obj` starting from `x0` using the limited-memory BFGS method
/// with two-loop recursion and a strong-Wolfe line search. When the oldest
/// curvature pair no longer fits in `memory` it is dropped.
///
/// Running out of iterations or failing a line search is reported through
/// [`OptimResult::termination`]; the returned point is always the best one
/// accepted so far.
pub fn lbfgs<F: Float, O: Objective<F>>(obj: &mut O, x0: &[F], config: &LbfgsConfig<F>) -> OptimResult<F> {
    let n = x0.len();
    let m = config.memory;

    let mut x = x0.to_vec();
    let (mut f_val, mut grad) = obj.eval_grad(&x);
    let mut func_evals = 1usize;
    let mut grad_norm = norm(&grad);

    if !f_val.is_finite() || !grad_norm.is_finite() {
        return finish(x, f_val, grad, grad_norm, 0, func_evals, TerminationReason::NumericalError);
    }
    if grad_norm < config.convergence.grad_tol {
        return finish(x, f_val, grad, grad_norm, 0, func_evals, TerminationReason::GradientNorm);
    }

    let mut history: VecDeque<Correction<F>> = VecDeque::with_capacity(m);

    for iter in 0..config.convergence.max_iter {
        let d = two_loop_recursion(&grad, &history);

        // Without curvature information the direction is the raw gradient;
        // scale the first trial step so it moves roughly unit distance.
        let alpha_init = if history.is_empty() {
            (F::one() / grad_norm).min(F::one())
        } else {
            F::one()
        };

        let ls = match strong_wolfe(obj, &x, &d, f_val, &grad, alpha_init, &config.line_search) {
            Some(ls) => ls,
            None if !history.is_empty() => {
                trace!(iter, "line search failed, restarting from steepest descent");
                history.clear();
                continue;
            }
            None => {
                return finish(x, f_val, grad, grad_norm, iter, func_evals, TerminationReason::LineSearchFailed);
            }
        };
        func_evals += ls.evals;

        let mut s = vec![F::zero(); n];
        let mut y = vec![F::zero(); n];
        for i in 0..n {
            s[i] = ls.alpha * d[i];
            y[i] = ls.gradient[i] - grad[i];
            x[i] = x[i] + s[i];
        }

        let f_prev = f_val;
        f_val = ls.value;
        grad = ls.gradient;
        grad_norm = norm(&grad);
        let step_norm = norm(&s);

        // Skip pairs that would break positive definiteness.
        let sy = dot(&s, &y);
        if m > 0 && sy > F::zero() {
            if history.len() == m {
                history.pop_front();
            }
            history.push_back(Correction {
                s,
                y,
                rho: F::one() / sy,
            });
        }

        if let Some(reason) = config.convergence.check(grad_norm, step_norm, f_prev, f_val) {
            return finish(x, f_val, grad, grad_norm, iter + 1, func_evals, reason);
        }
    }

    let iterations = config.convergence.max_iter;
    finish(x, f_val, grad, grad_norm, iterations, func_evals, TerminationReason::MaxIterations)
}

/// Minimize a `(value, gradient)` callback over `dimension` variables with
/// the default [`LbfgsConfig`].
///
/// ```
/// let result = termdiff_optim::optimize(
///     2,
///     |x: &[f64]| {
///         let f = (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2);
///         (f, vec![2.0 * (x[0] - 1.0), 2.0 * (x[1] + 2.0)])
///     },
///     &[0.0, 0.0],
/// )
/// .unwrap();
/// assert!((result.x[0] - 1.0).abs() < 1e-6);
/// assert!((result.x[1] + 2.0).abs() < 1e-6);
/// ```
pub fn optimize<G>(dimension: usize, evaluate: G, start: &[f64]) -> Result<OptimResult<f64>, OptimError>
where
    G: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    optimize_with(dimension, evaluate, start, &LbfgsConfig::default())
}

/// [`optimize`] with an explicit configuration.
pub fn optimize_with<G>(
    dimension: usize,
    evaluate: G,
    start: &[f64],
    config: &LbfgsConfig<f64>,
) -> Result<OptimResult<f64>, OptimError>
where
    G: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    if start.len() != dimension {
        return Err(OptimError::DimensionMismatch {
            expected: dimension,
            found: start.len(),
        });
    }
    let mut obj = CheckedObjective {
        dim: dimension,
        eval: evaluate,
        bad_len: None,
    };
    let result = lbfgs(&mut obj, start, config);
    match obj.bad_len {
        Some(found) => Err(OptimError::DimensionMismatch {
            expected: dimension,
            found,
        }),
        None => Ok(result),
    }
}

/// Callback objective that remembers the first gradient of the wrong length.
struct CheckedObjective<G> {
    dim: usize,
    eval: G,
    bad_len: Option<usize>,
}

impl<G: FnMut(&[f64]) -> (f64, Vec<f64>)> Objective<f64> for CheckedObjective<G> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval_grad(&mut self, x: &[f64]) -> (f64, Vec<f64>) {
        let (value, grad) = (self.eval)(x);
        if grad.len() != self.dim {
            self.bad_len.get_or_insert(grad.len());
            return (f64::NAN, vec![f64::NAN; self.dim]);
        }
        (value, grad)
    }
}

/// L-BFGS two-loop recursion: compute d = -H_k * g_k.
fn two_loop_recursion<F: Float>(grad: &[F], history: &VecDeque<Correction<F>>) -> Vec<F> {
    let k = history.len();

    // q = g
    let mut q: Vec<F> = grad.to_vec();

    // First loop: newest to oldest
    let mut alpha = vec![F::zero(); k];
    for (i, c) in history.iter().enumerate().rev() {
        alpha[i] = c.rho * dot(&c.s, &q);
        for (qj, &yj) in q.iter_mut().zip(&c.y) {
            *qj = *qj - alpha[i] * yj;
        }
    }

    // Initial Hessian approximation: H_0 = gamma * I
    // gamma = s^T y / y^T y (from the most recent pair)
    let mut r = q;
    if let Some(last) = history.back() {
        let yy = dot(&last.y, &last.y);
        if yy > F::zero() {
            let gamma = F::one() / (last.rho * yy);
            for v in r.iter_mut() {
                *v = *v * gamma;
            }
        }
    }

    // Second loop: oldest to newest
    for (i, c) in history.iter().enumerate() {
        let beta = c.rho * dot(&c.y, &r);
        for (rj, &sj) in r.iter_mut().zip(&c.s) {
            *rj = *rj + (alpha[i] - beta) * sj;
        }
    }

    for v in r.iter_mut() {
        *v = -*v;
    }
    r
}

#[allow(clippy::too_many_arguments)]
fn finish<F: Float>(
    x: Vec<F>,
    value: F,
    gradient: Vec<F>,
    gradient_norm: F,
    iterations: usize,
    func_evals: usize,
    termination: TerminationReason,
) -> OptimResult<F> {
    debug!(
        iterations,
        func_evals,
        value = as_f64(value),
        gradient_norm = as_f64(gradient_norm),
        %termination,
        "l-bfgs finished"
    );
    OptimResult {
        x,
        value,
        gradient,
        gradient_norm,
        iterations,
        func_evals,
        termination,
    }
}

#[inline]
fn as_f64<F: Float>(v: F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}
