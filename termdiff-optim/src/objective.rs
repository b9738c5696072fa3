use termdiff::CompiledTerm;

/// Trait for optimization objectives.
///
/// Implementors provide function evaluation and gradient computation.
/// Methods take `&mut self` to allow caching, eval counting, and internal buffers.
pub trait Objective<F: num_traits::Float> {
    /// Number of input variables.
    fn dim(&self) -> usize;

    /// Evaluate the objective and its gradient at `x`.
    ///
    /// Returns `(f(x), ∇f(x))`. A point outside the objective's domain is
    /// reported with a non-finite value.
    fn eval_grad(&mut self, x: &[F]) -> (F, Vec<F>);
}

/// Adapter wrapping a `(value, gradient)` closure as an [`Objective`].
pub struct FnObjective<G> {
    dim: usize,
    eval: G,
    func_evals: usize,
}

impl<G> FnObjective<G> {
    pub fn new(dim: usize, eval: G) -> Self {
        FnObjective {
            dim,
            eval,
            func_evals: 0,
        }
    }

    /// Number of function evaluations performed so far.
    pub fn func_evals(&self) -> usize {
        self.func_evals
    }
}

impl<F, G> Objective<F> for FnObjective<G>
where
    F: num_traits::Float,
    G: FnMut(&[F]) -> (F, Vec<F>),
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval_grad(&mut self, x: &[F]) -> (F, Vec<F>) {
        self.func_evals += 1;
        (self.eval)(x)
    }
}

/// Adapter wrapping a [`CompiledTerm`] (with fixed parameter values) as an
/// [`Objective`].
///
/// Evaluation errors inside the term (a logarithm or fractional power
/// leaving its domain) are reported as a NaN value and gradient, which the
/// line search rejects.
pub struct CompiledObjective<'a> {
    term: &'a CompiledTerm,
    params: &'a [f64],
    func_evals: usize,
}

impl<'a> CompiledObjective<'a> {
    pub fn new(term: &'a CompiledTerm) -> Self {
        Self::with_params(term, &[])
    }

    /// Objective with `params` bound to the term's parameter slots.
    pub fn with_params(term: &'a CompiledTerm, params: &'a [f64]) -> Self {
        CompiledObjective {
            term,
            params,
            func_evals: 0,
        }
    }

    /// Number of function evaluations performed so far.
    pub fn func_evals(&self) -> usize {
        self.func_evals
    }

    /// Borrow the underlying term.
    pub fn term(&self) -> &CompiledTerm {
        self.term
    }
}

impl Objective<f64> for CompiledObjective<'_> {
    fn dim(&self) -> usize {
        self.term.num_inputs()
    }

    fn eval_grad(&mut self, x: &[f64]) -> (f64, Vec<f64>) {
        self.func_evals += 1;
        match self.term.evaluate_parametric(x, self.params) {
            Ok((grad, value)) => (value, grad),
            Err(_) => (f64::NAN, vec![f64::NAN; x.len()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_objective_reports_domain_error_as_nan() {
        let mut g = termdiff::Graph::new();
        let x = g.variable();
        let f = g.ln(x);
        let term = termdiff::compile(&g, f, &[x]).unwrap();
        let mut obj = CompiledObjective::new(&term);
        assert_eq!(obj.eval_grad(&[1.0]), (0.0, vec![1.0]));
        let (v, grad) = obj.eval_grad(&[-1.0]);
        assert!(v.is_nan() && grad[0].is_nan());
        assert_eq!(obj.func_evals(), 2);
    }

    #[test]
    fn closure_objective_counts_evals() {
        let mut obj = FnObjective::new(1, |x: &[f64]| (x[0] * x[0], vec![2.0 * x[0]]));
        assert_eq!(Objective::<f64>::dim(&obj), 1);
        assert_eq!(obj.eval_grad(&[3.0]), (9.0, vec![6.0]));
        assert_eq!(obj.func_evals(), 1);
    }
}
