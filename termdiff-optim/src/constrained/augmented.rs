use tracing::{debug, warn};

use super::lagrangian::CompiledLagrangian;
use super::{ConstrainedSolver, Iterate, Problem, SolveStatus};
use crate::convergence::norm;
use crate::error::OptimError;
use crate::solvers::lbfgs::{lbfgs, LbfgsConfig};

/// Configuration for the [`AugmentedLagrangian`] solver.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AugmentedLagrangianConfig {
    /// Starting penalty weight `μ₀` (default: 10).
    pub initial_penalty: f64,
    /// Largest penalty weight (default: 1e3).
    pub max_penalty: f64,
    /// Factor applied to `μ` when the constraint violation stalls (default: 100).
    pub penalty_growth: f64,
    /// Converged when `||c|| <= constraint_tol` (default: 1e-8) ...
    pub constraint_tol: f64,
    /// ... and `||∇L|| <= lagrangian_gradient_tol` (default: 2e-6).
    pub lagrangian_gradient_tol: f64,
    /// Floor for the subproblem gradient tolerance (default: 4e-7).
    pub min_inner_tol: f64,
    /// Floor for the violation target that decides penalty growth (default: 1e-8).
    pub min_violation_target: f64,
    /// Maximum number of outer iterations (default: 1000).
    pub max_outer_iterations: usize,
    /// Subproblem solver settings. The gradient tolerance is overridden by
    /// the outer loop.
    pub lbfgs: LbfgsConfig<f64>,
}

impl Default for AugmentedLagrangianConfig {
    fn default() -> Self {
        AugmentedLagrangianConfig {
            initial_penalty: 10.0,
            max_penalty: 1e3,
            penalty_growth: 100.0,
            constraint_tol: 1e-8,
            lagrangian_gradient_tol: 2e-6,
            min_inner_tol: 4e-7,
            min_violation_target: 1e-8,
            max_outer_iterations: 1000,
            lbfgs: LbfgsConfig::default(),
        }
    }
}

/// Augmented-Lagrangian method for equality constraints.
///
/// Each outer iteration minimizes
/// `L(x; λ, μ) = f(x) + Σ λᵢ cᵢ(x) + (μ/2) Σ cᵢ(x)²` with L-BFGS from the
/// previous point, then updates `λᵢ += μ cᵢ(x)`. The penalty `μ` grows when
/// the constraint violation does not fall below a shrinking target.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangian {
    config: AugmentedLagrangianConfig,
}

impl AugmentedLagrangian {
    pub fn new(config: AugmentedLagrangianConfig) -> Self {
        AugmentedLagrangian { config }
    }

    pub fn config(&self) -> &AugmentedLagrangianConfig {
        &self.config
    }
}

impl ConstrainedSolver for AugmentedLagrangian {
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError> {
        let lagrangian =
            CompiledLagrangian::new(problem.graph, problem.objective, &problem.constraints, &problem.variables)?;
        if problem.start.len() != lagrangian.dim() {
            return Err(OptimError::DimensionMismatch {
                expected: lagrangian.dim(),
                found: problem.start.len(),
            });
        }

        // Reject a start point outside the domain of any term.
        let multipliers = vec![0.0; lagrangian.constraints_count()];
        lagrangian.lagrangian_with_gradient(&problem.start, &multipliers, self.config.initial_penalty)?;

        let mu = self.config.initial_penalty;
        Ok(Box::new(Outer {
            config: &self.config,
            lagrangian,
            x: problem.start.clone(),
            multipliers,
            penalty: mu,
            violation_target: mu.powf(-0.1).max(self.config.min_violation_target),
            inner_tol: (1.0 / mu).max(self.config.min_inner_tol),
            iteration: 0,
            done: false,
        }))
    }
}

/// Outer-loop state, owned by the iterator returned from `solve`.
struct Outer<'a> {
    config: &'a AugmentedLagrangianConfig,
    lagrangian: CompiledLagrangian,
    x: Vec<f64>,
    multipliers: Vec<f64>,
    penalty: f64,
    /// `η`: constraint norm below which the penalty is left alone.
    violation_target: f64,
    /// `ω`: gradient tolerance for the next subproblem.
    inner_tol: f64,
    iteration: usize,
    done: bool,
}

impl Outer<'_> {
    fn subsolve(&mut self) -> (f64, crate::TerminationReason) {
        let params = self.lagrangian.params(&self.multipliers, self.penalty);
        let mut config = self.config.lbfgs.clone();
        config.convergence.grad_tol = self.inner_tol;

        let mut obj = self.lagrangian.objective(&params);
        let result = lbfgs(&mut obj, &self.x, &config);
        self.x = result.x;
        (result.gradient_norm, result.termination)
    }

    fn update_penalty(&mut self, constraint_norm: f64) {
        let cfg = self.config;
        if constraint_norm > self.violation_target {
            self.penalty = (self.penalty * cfg.penalty_growth).min(cfg.max_penalty);
            self.violation_target = self.penalty.powf(-0.1);
        } else {
            self.violation_target /= self.penalty.powf(0.9);
        }
        self.violation_target = self.violation_target.max(cfg.min_violation_target);
        self.inner_tol = (self.inner_tol / self.penalty).max(cfg.min_inner_tol);
    }
}

impl Iterator for Outer<'_> {
    type Item = Iterate;

    fn next(&mut self) -> Option<Iterate> {
        if self.done {
            return None;
        }

        let penalty = self.penalty;
        let (gradient_norm, inner) = self.subsolve();

        let (value, constraints) = match self.lagrangian.measure(&self.x) {
            Ok(measured) => measured,
            Err(err) => {
                warn!(%err, "objective or constraints could not be evaluated at the subproblem solution");
                self.done = true;
                return None;
            }
        };
        for (lambda, c) in self.multipliers.iter_mut().zip(&constraints) {
            *lambda += penalty * c;
        }
        let constraint_norm = norm(&constraints);

        // The subproblem gradient is ∇f + Σ (λᵢ + μcᵢ) ∇cᵢ, the gradient of
        // the plain Lagrangian at the updated multipliers.
        let converged =
            constraint_norm <= self.config.constraint_tol && gradient_norm <= self.config.lagrangian_gradient_tol;
        let status = if converged {
            SolveStatus::Converged
        } else if self.iteration + 1 >= self.config.max_outer_iterations {
            SolveStatus::MaxIterations
        } else {
            SolveStatus::InProgress
        };

        debug!(
            iteration = self.iteration,
            constraint_norm,
            gradient_norm,
            penalty,
            %inner,
            ?status,
            "augmented lagrangian iteration"
        );

        let iterate = Iterate {
            x: self.x.clone(),
            value,
            constraint_norm,
            lagrangian_gradient_norm: gradient_norm,
            multipliers: self.multipliers.clone(),
            penalty,
            iteration: self.iteration,
            status,
        };

        if status == SolveStatus::InProgress {
            self.update_penalty(constraint_norm);
        } else {
            self.done = true;
        }
        self.iteration += 1;
        Some(iterate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termdiff::Graph;

    #[test]
    fn penalty_is_monotone_and_capped() {
        let mut g = Graph::new();
        let x = g.variable();
        let c = g.scope(|| x - 1.0);
        let problem = Problem::new(&g, x.expr(), vec![c], vec![x], vec![0.0]).unwrap();
        let solver = AugmentedLagrangian::default();
        let penalties: Vec<f64> = solver.solve(&problem).unwrap().take(3).map(|it| it.penalty).collect();
        assert_eq!(penalties[0], 10.0);
        assert!(penalties.windows(2).all(|w| w[1] >= w[0]));
        assert!(penalties.iter().all(|&mu| mu <= 1e3));
    }

    #[test]
    fn iteration_cap_ends_sequence() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.scope(|| x * x + y * y);
        let c = g.scope(|| x * y - 4.0);
        let problem = Problem::new(&g, f, vec![c], vec![x, y], vec![1.0, 3.0]).unwrap();
        let solver = AugmentedLagrangian::new(AugmentedLagrangianConfig {
            max_outer_iterations: 2,
            ..AugmentedLagrangianConfig::default()
        });
        let iterates: Vec<Iterate> = solver.solve(&problem).unwrap().collect();
        assert!(iterates.len() <= 2);
        let last = iterates.last().unwrap();
        assert_ne!(last.status, SolveStatus::InProgress);
    }

    #[test]
    fn start_outside_domain_is_rejected() {
        let mut g = Graph::new();
        let x = g.variable();
        let f = g.ln(x);
        let c = g.scope(|| x - 2.0);
        let problem = Problem::new(&g, f, vec![c], vec![x], vec![-1.0]).unwrap();
        let err = AugmentedLagrangian::default().solve(&problem).err().unwrap();
        assert_eq!(err, OptimError::Expr(termdiff::Error::LogDomain(-1.0)));
    }
}
