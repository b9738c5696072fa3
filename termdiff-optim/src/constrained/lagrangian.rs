use termdiff::{compile, compile_parametric, CompiledTerm, Expr, ExprVec, Graph, Var};

use crate::objective::CompiledObjective;

/// The augmented Lagrangian `L(x; λ, μ) = f(x) + Σ λᵢ cᵢ(x) + (μ/2) Σ cᵢ(x)²`
/// compiled once, with `μ` and `λ` bound per evaluation.
///
/// Compiling works on a private copy of the graph, so the caller's graph
/// gains no multiplier or penalty variables.
#[derive(Clone, Debug)]
pub struct CompiledLagrangian {
    /// Parameters are `[μ, λ₀, λ₁, ...]`.
    lagrangian: CompiledTerm,
    constraints: Vec<CompiledTerm>,
}

impl CompiledLagrangian {
    pub fn new(graph: &Graph, objective: Expr, constraints: &[Expr], variables: &[Var]) -> termdiff::Result<Self> {
        let mut g = graph.clone();
        let mu = g.variable();
        let lambdas = g.variables(constraints.len());

        let c = ExprVec::new(constraints.to_vec());
        let weighted = ExprVec::from_vars(&lambdas).dot(&mut g, &c);
        let squares = c.norm_squared(&mut g);
        let half = g.constant(0.5);
        let half_mu = g.mul(half, mu);
        let penalty = g.mul(half_mu, squares);
        let root = g.sum([objective, weighted, penalty]);

        let params: Vec<Var> = std::iter::once(mu).chain(lambdas).collect();
        let lagrangian = compile_parametric(&g, root, variables, &params)?;
        let constraints = constraints
            .iter()
            .map(|&c| compile(graph, c, variables))
            .collect::<termdiff::Result<Vec<_>>>()?;

        Ok(CompiledLagrangian {
            lagrangian,
            constraints,
        })
    }

    #[inline]
    pub fn constraints_count(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.lagrangian.num_inputs()
    }

    /// `(L, ∇ₓL)` at `x`.
    pub fn lagrangian_with_gradient(&self, x: &[f64], multipliers: &[f64], penalty: f64) -> termdiff::Result<(f64, Vec<f64>)> {
        let params = self.params(multipliers, penalty);
        let (grad, value) = self.lagrangian.evaluate_parametric(x, &params)?;
        Ok((value, grad))
    }

    /// Objective value at `x` (the Lagrangian with `λ = 0`, `μ = 0`).
    pub fn objective_value(&self, x: &[f64]) -> termdiff::Result<f64> {
        let params = vec![0.0; 1 + self.constraints.len()];
        self.lagrangian.value_parametric(x, &params)
    }

    /// Value of every constraint at `x`.
    pub fn evaluate_constraints(&self, x: &[f64]) -> termdiff::Result<Vec<f64>> {
        self.constraints.iter().map(|c| c.value(x)).collect()
    }

    /// Objective value and constraint values at `x`, failing if either
    /// leaves its domain.
    pub fn measure(&self, x: &[f64]) -> termdiff::Result<(f64, Vec<f64>)> {
        Ok((self.objective_value(x)?, self.evaluate_constraints(x)?))
    }

    /// Parameter vector `[μ, λ...]` for [`objective`](Self::objective).
    pub(crate) fn params(&self, multipliers: &[f64], penalty: f64) -> Vec<f64> {
        std::iter::once(penalty).chain(multipliers.iter().copied()).collect()
    }

    /// The Lagrangian with fixed parameters as an L-BFGS objective.
    pub(crate) fn objective<'a>(&'a self, params: &'a [f64]) -> CompiledObjective<'a> {
        CompiledObjective::with_params(&self.lagrangian, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_closed_form() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.mul(x, y);
        let c = g.scope(|| x + y - 1.0);
        let before = g.len();
        let l = CompiledLagrangian::new(&g, f, &[c], &[x, y]).unwrap();
        assert_eq!(g.len(), before);
        assert_eq!(l.constraints_count(), 1);

        // L = xy + λ(x+y-1) + (μ/2)(x+y-1)^2 at x=2, y=3, λ=0.5, μ=4.
        let (value, grad) = l.lagrangian_with_gradient(&[2.0, 3.0], &[0.5], 4.0).unwrap();
        assert_eq!(value, 6.0 + 0.5 * 4.0 + 2.0 * 16.0);
        // ∂L/∂x = y + λ + μ(x+y-1)
        assert_eq!(grad, vec![3.0 + 0.5 + 16.0, 2.0 + 0.5 + 16.0]);

        assert_eq!(l.evaluate_constraints(&[2.0, 3.0]).unwrap(), vec![4.0]);
        assert_eq!(l.objective_value(&[2.0, 3.0]).unwrap(), 6.0);
    }

    #[test]
    fn wrong_multiplier_count_is_rejected() {
        let mut g = Graph::new();
        let x = g.variable();
        let c = g.scope(|| x - 1.0);
        let l = CompiledLagrangian::new(&g, x.expr(), &[c], &[x]).unwrap();
        assert!(l.lagrangian_with_gradient(&[0.0], &[], 1.0).is_err());
    }

    #[test]
    fn measure_reports_objective_domain_error() {
        let mut g = Graph::new();
        let x = g.variable();
        let f = g.ln(x);
        let c = g.scope(|| x - 1.0);
        let l = CompiledLagrangian::new(&g, f, &[c], &[x]).unwrap();

        let (value, constraints) = l.measure(&[1.0]).unwrap();
        assert_eq!(value, 0.0);
        assert_eq!(constraints, vec![0.0]);
        // The constraint alone is fine at -1; the objective is not.
        assert!(l.evaluate_constraints(&[-1.0]).is_ok());
        assert_eq!(l.measure(&[-1.0]).unwrap_err(), termdiff::Error::LogDomain(-1.0));
    }
}
