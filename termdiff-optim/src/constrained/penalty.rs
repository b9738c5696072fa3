use tracing::debug;

use super::lagrangian::CompiledLagrangian;
use super::{ConstrainedSolver, Iterate, Problem, SolveStatus};
use crate::convergence::norm;
use crate::error::OptimError;
use crate::result::TerminationReason;
use crate::solvers::lbfgs::{lbfgs, LbfgsConfig};

/// Configuration for the [`ConstantPenalty`] solver.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstantPenaltyConfig {
    /// Weight `μ` on the squared constraint values (default: 1e3).
    pub penalty: f64,
    /// Gradient norm at which the single solve stops (default: 1e-6).
    pub gradient_tol: f64,
    /// Solver settings. `convergence.grad_tol` is replaced by `gradient_tol`.
    pub lbfgs: LbfgsConfig<f64>,
}

impl Default for ConstantPenaltyConfig {
    fn default() -> Self {
        ConstantPenaltyConfig {
            penalty: 1e3,
            gradient_tol: 1e-6,
            lbfgs: LbfgsConfig::default(),
        }
    }
}

/// Quadratic-penalty method with a fixed weight.
///
/// Minimizes `f(x) + μ Σ cᵢ(x)²` once and yields a single iterate. The
/// constraints are only satisfied to roughly `O(1/μ)`.
#[derive(Debug, Clone, Default)]
pub struct ConstantPenalty {
    config: ConstantPenaltyConfig,
}

impl ConstantPenalty {
    pub fn new(config: ConstantPenaltyConfig) -> Self {
        ConstantPenalty { config }
    }

    pub fn config(&self) -> &ConstantPenaltyConfig {
        &self.config
    }

    fn run(&self, lagrangian: &CompiledLagrangian, start: &[f64]) -> Result<Iterate, OptimError> {
        let mu = self.config.penalty;
        let zeros = vec![0.0; lagrangian.constraints_count()];
        // f + μΣc² is the augmented Lagrangian at λ = 0 and weight 2μ.
        let params = lagrangian.params(&zeros, 2.0 * mu);
        lagrangian.lagrangian_with_gradient(start, &zeros, 2.0 * mu)?;

        let mut config = self.config.lbfgs.clone();
        config.convergence.grad_tol = self.config.gradient_tol;
        let mut obj = lagrangian.objective(&params);
        let result = lbfgs(&mut obj, start, &config);

        let (value, constraints) = lagrangian.measure(&result.x)?;
        let status = if result.converged() {
            SolveStatus::Converged
        } else if result.termination == TerminationReason::MaxIterations {
            SolveStatus::MaxIterations
        } else {
            SolveStatus::Stalled
        };
        debug!(
            constraint_norm = norm(&constraints),
            gradient_norm = result.gradient_norm,
            termination = %result.termination,
            "constant penalty solve finished"
        );

        Ok(Iterate {
            value,
            constraint_norm: norm(&constraints),
            lagrangian_gradient_norm: result.gradient_norm,
            // ∇(f + μΣc²) = ∇f + Σ 2μcᵢ ∇cᵢ.
            multipliers: constraints.iter().map(|c| 2.0 * mu * c).collect(),
            penalty: mu,
            iteration: 0,
            status,
            x: result.x,
        })
    }
}

impl ConstrainedSolver for ConstantPenalty {
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError> {
        let lagrangian =
            CompiledLagrangian::new(problem.graph, problem.objective, &problem.constraints, &problem.variables)?;
        if problem.start.len() != lagrangian.dim() {
            return Err(OptimError::DimensionMismatch {
                expected: lagrangian.dim(),
                found: problem.start.len(),
            });
        }
        let iterate = self.run(&lagrangian, &problem.start)?;
        Ok(Box::new(std::iter::once(iterate)))
    }
}
