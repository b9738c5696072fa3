//! Equality-constrained minimization over expression graphs.
//!
//! A [`Problem`] names an objective, constraints that must equal zero at a
//! solution, the free variables, and a start point. A [`ConstrainedSolver`]
//! turns it into a lazy sequence of improving [`Iterate`]s by solving a
//! series of unconstrained subproblems with L-BFGS.

use termdiff::{Expr, Graph, Var};

use crate::error::OptimError;

mod augmented;
mod lagrangian;
mod multistage;
mod penalty;
mod trace;

pub use self::augmented::{AugmentedLagrangian, AugmentedLagrangianConfig};
pub use self::lagrangian::CompiledLagrangian;
pub use self::multistage::Multistage;
pub use self::penalty::{ConstantPenalty, ConstantPenaltyConfig};
pub use self::trace::{MemorySink, Minimizer, ProblemSnapshot, TraceSink};

/// An equality-constrained minimization problem over terms of one graph.
#[derive(Clone, Debug)]
pub struct Problem<'g> {
    pub graph: &'g Graph,
    pub objective: Expr,
    /// Each constraint is satisfied when it evaluates to zero.
    pub constraints: Vec<Expr>,
    pub variables: Vec<Var>,
    /// Initial point, one value per entry of `variables`.
    pub start: Vec<f64>,
}

impl<'g> Problem<'g> {
    /// Assemble a problem, checking that every handle belongs to `graph` and
    /// that `start` matches `variables`.
    pub fn new(
        graph: &'g Graph,
        objective: Expr,
        constraints: Vec<Expr>,
        variables: Vec<Var>,
        start: Vec<f64>,
    ) -> Result<Self, OptimError> {
        if start.len() != variables.len() {
            return Err(OptimError::DimensionMismatch {
                expected: variables.len(),
                found: start.len(),
            });
        }
        graph.node(objective)?;
        for &c in &constraints {
            graph.node(c)?;
        }
        for v in &variables {
            graph.node(v.expr())?;
        }
        Ok(Problem {
            graph,
            objective,
            constraints,
            variables,
            start,
        })
    }

    /// The same problem started from `start`.
    pub fn restarted(&self, start: Vec<f64>) -> Result<Self, OptimError> {
        if start.len() != self.variables.len() {
            return Err(OptimError::DimensionMismatch {
                expected: self.variables.len(),
                found: start.len(),
            });
        }
        Ok(Problem {
            start,
            ..self.clone()
        })
    }
}

/// Where a solver's sequence stands after an iterate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveStatus {
    /// More iterates follow.
    InProgress,
    /// Convergence tolerances were met; this is the last iterate.
    Converged,
    /// The iteration cap was reached; this is the last iterate.
    MaxIterations,
    /// The unconstrained solve stopped without meeting its tolerance, e.g.
    /// on a failed line search; this is the last iterate.
    Stalled,
}

/// One point in a solver's sequence of improving solutions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Iterate {
    /// Point, ordered like [`Problem::variables`].
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Euclidean norm of the constraint values at `x`.
    pub constraint_norm: f64,
    /// Norm of the gradient of `f + Σ λᵢ cᵢ` at `x`, using the updated
    /// multipliers.
    pub lagrangian_gradient_norm: f64,
    /// Multiplier estimates, one per constraint.
    pub multipliers: Vec<f64>,
    /// Penalty weight used for the subproblem that produced `x`.
    pub penalty: f64,
    /// Zero-based index of the outer iteration.
    pub iteration: usize,
    pub status: SolveStatus,
}

/// A strategy that reduces a constrained problem to unconstrained solves.
pub trait ConstrainedSolver {
    /// The forward-only sequence of improving iterates.
    ///
    /// Compilation and start-point validation happen here, so a returned
    /// iterator only does numeric work. Solver state is owned by the
    /// iterator and dropped with it.
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError>;

    /// Run the sequence to completion and return its last iterate.
    fn minimize(&self, problem: &Problem<'_>) -> Result<Iterate, OptimError> {
        self.solve(problem)?.last().ok_or(OptimError::NoIterates)
    }
}

impl<S: ConstrainedSolver + ?Sized> ConstrainedSolver for Box<S> {
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError> {
        (**self).solve(problem)
    }
}

/// Minimize with the default [`AugmentedLagrangian`] solver.
///
/// ```
/// use termdiff::Graph;
/// use termdiff_optim::constrained::{minimize, Problem, SolveStatus};
///
/// let mut g = Graph::new();
/// let x = g.variable();
/// let y = g.variable();
/// let objective = g.scope(|| (x - 1.0).square() + (y - 2.0).square());
/// let constraint = g.scope(|| x + y - 1.0);
/// let problem = Problem::new(&g, objective, vec![constraint], vec![x, y], vec![0.0, 0.0]).unwrap();
///
/// let solution = minimize(&problem).unwrap();
/// assert_eq!(solution.status, SolveStatus::Converged);
/// assert!((solution.x[0] - 0.0).abs() < 1e-5);
/// assert!((solution.x[1] - 1.0).abs() < 1e-5);
/// ```
pub fn minimize(problem: &Problem<'_>) -> Result<Iterate, OptimError> {
    AugmentedLagrangian::default().minimize(problem)
}
