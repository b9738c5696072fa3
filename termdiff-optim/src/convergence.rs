use num_traits::Float;

use crate::result::TerminationReason;

/// Parameters controlling convergence checks.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceParams<F> {
    /// Maximum number of iterations (default: 1000).
    pub max_iter: usize,
    /// Gradient norm tolerance: stop when `||g|| < grad_tol` (default: 1e-8).
    pub grad_tol: F,
    /// Step size tolerance: stop when `||x_{k+1} - x_k|| < step_tol` (default: 1e-14).
    pub step_tol: F,
    /// Function change tolerance: stop when `|f_{k+1} - f_k| < func_tol` (default: 0, disabled).
    pub func_tol: F,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 1000,
            grad_tol: 1e-8,
            step_tol: 1e-14,
            func_tol: 0.0,
        }
    }
}

impl Default for ConvergenceParams<f32> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 1000,
            grad_tol: 1e-5,
            step_tol: 1e-7,
            func_tol: 0.0,
        }
    }
}

impl<F: Float> ConvergenceParams<F> {
    /// Same parameters with a different gradient tolerance.
    pub fn with_grad_tol(mut self, grad_tol: F) -> Self {
        self.grad_tol = grad_tol;
        self
    }

    /// The termination reason met after an accepted step, if any.
    ///
    /// Checked in order: gradient norm, step size, function change.
    pub fn check(&self, grad_norm: F, step_norm: F, f_prev: F, f: F) -> Option<TerminationReason> {
        if grad_norm < self.grad_tol {
            Some(TerminationReason::GradientNorm)
        } else if step_norm < self.step_tol {
            Some(TerminationReason::StepSize)
        } else if self.func_tol > F::zero() && (f_prev - f).abs() < self.func_tol {
            Some(TerminationReason::FunctionChange)
        } else {
            None
        }
    }
}

/// Compute the L2 norm of a vector.
pub fn norm<F: Float>(v: &[F]) -> F {
    dot(v, v).sqrt()
}

/// Compute the dot product of two vectors.
pub fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).fold(F::zero(), |s, (&x, &y)| s + x * y)
}

/// `x + alpha * d`, written into `out`.
pub(crate) fn step_to<F: Float>(x: &[F], alpha: F, d: &[F], out: &mut [F]) {
    for ((o, &xi), &di) in out.iter_mut().zip(x).zip(d) {
        *o = xi + alpha * di;
    }
}
