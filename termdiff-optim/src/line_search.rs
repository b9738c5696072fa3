use num_traits::Float;
use tracing::trace;

use crate::convergence::{dot, step_to};
use crate::objective::Objective;

/// Parameters for the strong-Wolfe line search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WolfeParams<F> {
    /// Sufficient decrease parameter (default: 1e-4).
    pub c1: F,
    /// Curvature parameter (default: 0.9).
    pub c2: F,
    /// Largest step the bracketing phase will try (default: 1e10).
    pub alpha_max: F,
    /// Step doublings before giving up on bracketing (default: 20).
    pub max_bracket: usize,
    /// Interpolation steps inside a bracket (default: 30).
    pub max_zoom: usize,
}

impl Default for WolfeParams<f64> {
    fn default() -> Self {
        WolfeParams {
            c1: 1e-4,
            c2: 0.9,
            alpha_max: 1e10,
            max_bracket: 20,
            max_zoom: 30,
        }
    }
}

impl Default for WolfeParams<f32> {
    fn default() -> Self {
        WolfeParams {
            c1: 1e-4,
            c2: 0.9,
            alpha_max: 1e10,
            max_bracket: 20,
            max_zoom: 30,
        }
    }
}

/// Result of a successful line search.
#[derive(Debug)]
pub struct LineSearchResult<F> {
    /// The accepted step size.
    pub alpha: F,
    /// Objective value at `x + alpha * d`.
    pub value: F,
    /// Gradient at `x + alpha * d`.
    pub gradient: Vec<F>,
    /// Number of function evaluations used.
    pub evals: usize,
}

/// One evaluated step along the search direction.
struct Trial<F> {
    alpha: F,
    value: F,
    /// Directional derivative `g(x + alpha*d)^T d`.
    slope: F,
    gradient: Vec<F>,
}

impl<F> Trial<F> {
    fn accept(self, evals: usize) -> LineSearchResult<F> {
        LineSearchResult {
            alpha: self.alpha,
            value: self.value,
            gradient: self.gradient,
            evals,
        }
    }
}

/// Line search satisfying the strong Wolfe conditions
/// (Nocedal & Wright, Algorithms 3.5 and 3.6).
///
/// Finds `alpha` with `f(x + alpha*d) <= f(x) + c1 * alpha * g^T d` and
/// `|g(x + alpha*d)^T d| <= c2 * |g^T d|`. A non-finite trial value counts as
/// a failed sufficient-decrease test, so the step shrinks.
///
/// If the bracket collapses without meeting the curvature condition, the best
/// sufficient-decrease point found is returned. Returns `None` when `d` is not
/// a descent direction or no step decreases the objective.
pub fn strong_wolfe<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    f_x: F,
    grad_x: &[F],
    alpha_init: F,
    params: &WolfeParams<F>,
) -> Option<LineSearchResult<F>> {
    let dg0 = dot(grad_x, d);

    if dg0 >= F::zero() || dg0.is_nan() {
        trace!("line search: direction is not a descent direction");
        return None;
    }

    let mut x_new = vec![F::zero(); x.len()];
    let mut evals = 0;
    let mut prev = Trial {
        alpha: F::zero(),
        value: f_x,
        slope: dg0,
        gradient: grad_x.to_vec(),
    };
    let mut alpha = alpha_init;
    let two = F::one() + F::one();

    for i in 0..params.max_bracket {
        step_to(x, alpha, d, &mut x_new);
        let (value, gradient) = obj.eval_grad(&x_new);
        evals += 1;
        let cur = Trial {
            alpha,
            value,
            slope: dot(&gradient, d),
            gradient,
        };

        if !sufficient_decrease(&cur, f_x, dg0, params.c1) || (i > 0 && cur.value >= prev.value) {
            return zoom(obj, x, d, f_x, dg0, prev, cur, params, &mut x_new, evals);
        }
        if cur.slope.abs() <= -params.c2 * dg0 {
            return Some(cur.accept(evals));
        }
        if cur.slope >= F::zero() {
            return zoom(obj, x, d, f_x, dg0, cur, prev, params, &mut x_new, evals);
        }

        if alpha >= params.alpha_max {
            break;
        }
        alpha = (alpha * two).min(params.alpha_max);
        prev = cur;
    }

    trace!(evals, "line search: no bracket found");
    None
}

#[inline]
fn sufficient_decrease<F: Float>(t: &Trial<F>, f_x: F, dg0: F, c1: F) -> bool {
    t.value.is_finite() && t.value <= f_x + c1 * t.alpha * dg0
}

/// Shrink `[lo, hi]` until a point meets the strong Wolfe conditions.
///
/// `lo` always satisfies sufficient decrease and has the lowest value seen
/// so far; `hi` is the other end of the bracket.
#[allow(clippy::too_many_arguments)]
fn zoom<F: Float, O: Objective<F>>(
    obj: &mut O,
    x: &[F],
    d: &[F],
    f_x: F,
    dg0: F,
    mut lo: Trial<F>,
    mut hi: Trial<F>,
    params: &WolfeParams<F>,
    x_new: &mut [F],
    mut evals: usize,
) -> Option<LineSearchResult<F>> {
    for _ in 0..params.max_zoom {
        let alpha = interpolate(&lo, &hi);
        if alpha == lo.alpha || alpha == hi.alpha {
            break;
        }

        step_to(x, alpha, d, x_new);
        let (value, gradient) = obj.eval_grad(x_new);
        evals += 1;
        let cur = Trial {
            alpha,
            value,
            slope: dot(&gradient, d),
            gradient,
        };

        if !sufficient_decrease(&cur, f_x, dg0, params.c1) || cur.value >= lo.value {
            hi = cur;
            continue;
        }
        if cur.slope.abs() <= -params.c2 * dg0 {
            return Some(cur.accept(evals));
        }
        if cur.slope * (hi.alpha - lo.alpha) >= F::zero() {
            hi = std::mem::replace(&mut lo, cur);
        } else {
            lo = cur;
        }
    }

    if lo.alpha > F::zero() {
        trace!(evals, "line search: curvature condition not met, taking best decrease");
        Some(lo.accept(evals))
    } else {
        trace!(evals, "line search: no decrease found");
        None
    }
}

/// Minimizer of the cubic through both ends of the bracket, or the midpoint
/// when the cubic is unusable or lands too close to an end.
fn interpolate<F: Float>(lo: &Trial<F>, hi: &Trial<F>) -> F {
    let (a, b) = if lo.alpha < hi.alpha { (lo, hi) } else { (hi, lo) };
    let two = F::one() + F::one();
    let three = two + F::one();
    let width = b.alpha - a.alpha;
    let mid = a.alpha + width / two;

    let finite = a.value.is_finite() && b.value.is_finite() && a.slope.is_finite() && b.slope.is_finite();
    if !finite || width <= F::epsilon() * b.alpha {
        return mid;
    }

    let d1 = a.slope + b.slope - three * (b.value - a.value) / width;
    let d2_sq = d1 * d1 - a.slope * b.slope;
    if d2_sq < F::zero() {
        return mid;
    }
    let d2 = d2_sq.sqrt();
    let t = b.alpha - width * (b.slope + d2 - d1) / (b.slope - a.slope + two * d2);

    let margin = width * F::from(0.1).unwrap_or_else(F::zero);
    if !t.is_finite() || t < a.alpha + margin || t > b.alpha - margin {
        mid
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simple quadratic objective for testing: f(x) = 0.5 * (x0^2 + x1^2)
    struct Quadratic;

    impl Objective<f64> for Quadratic {
        fn dim(&self) -> usize {
            2
        }

        fn eval_grad(&mut self, x: &[f64]) -> (f64, Vec<f64>) {
            let f = 0.5 * (x[0] * x[0] + x[1] * x[1]);
            let g = vec![x[0], x[1]];
            (f, g)
        }
    }

    /// f(x) = sqrt(x) for x > 0, NaN otherwise; minimized along -x.
    struct Wall;

    impl Objective<f64> for Wall {
        fn dim(&self) -> usize {
            1
        }

        fn eval_grad(&mut self, x: &[f64]) -> (f64, Vec<f64>) {
            if x[0] <= 0.0 {
                (f64::NAN, vec![f64::NAN])
            } else {
                (x[0].sqrt(), vec![0.5 / x[0].sqrt()])
            }
        }
    }

    #[test]
    fn unit_step_on_quadratic() {
        let mut obj = Quadratic;
        let x = vec![2.0, 3.0];
        let (f_x, grad) = obj.eval_grad(&x);
        let d: Vec<f64> = grad.iter().map(|&g| -g).collect();

        let result = strong_wolfe(&mut obj, &x, &d, f_x, &grad, 1.0, &WolfeParams::default()).unwrap();

        // The exact minimizer along -g satisfies both conditions.
        assert_eq!(result.alpha, 1.0);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.evals, 1);
    }

    #[test]
    fn short_initial_step_expands() {
        let mut obj = Quadratic;
        let x = vec![2.0, 3.0];
        let (f_x, grad) = obj.eval_grad(&x);
        let d: Vec<f64> = grad.iter().map(|&g| -g).collect();

        let result = strong_wolfe(&mut obj, &x, &d, f_x, &grad, 1e-3, &WolfeParams::default()).unwrap();

        assert!(result.alpha > 1e-3);
        assert!(result.value < f_x);
        let slope: f64 = result.gradient.iter().zip(&d).map(|(g, d)| g * d).sum();
        assert!(slope.abs() <= 0.9 * dot(&grad, &d).abs());
    }

    #[test]
    fn non_finite_trial_shrinks_step() {
        let mut obj = Wall;
        let x = vec![1.0];
        let (f_x, grad) = obj.eval_grad(&x);
        // Unit step along -1 hits x = 0, where the objective is NaN.
        let d = vec![-1.0];

        let result = strong_wolfe(&mut obj, &x, &d, f_x, &grad, 1.0, &WolfeParams::default()).unwrap();

        assert!(result.alpha > 0.0 && result.alpha < 1.0);
        assert!(result.value.is_finite() && result.value < f_x);
    }

    #[test]
    fn non_descent_returns_none() {
        let mut obj = Quadratic;
        let x = vec![2.0, 3.0];
        let (f_x, grad) = obj.eval_grad(&x);
        // Ascent direction (same as gradient)
        let d = grad.clone();

        let result = strong_wolfe(&mut obj, &x, &d, f_x, &grad, 1.0, &WolfeParams::default());
        assert!(result.is_none());
    }
}
