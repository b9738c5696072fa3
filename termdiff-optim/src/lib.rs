//! Unconstrained and equality-constrained minimization on top of
//! [`termdiff`] gradients.
//!
//! [`lbfgs`] minimizes any [`Objective`]; [`optimize`] is the plain-callback
//! entry point. The [`constrained`] module reduces problems with equality
//! constraints to a sequence of L-BFGS solves.

pub mod constrained;
pub mod convergence;
pub mod error;
pub mod line_search;
pub mod objective;
pub mod result;
pub mod solvers;

pub use constrained::{
    minimize, AugmentedLagrangian, AugmentedLagrangianConfig, ConstantPenalty, ConstantPenaltyConfig,
    ConstrainedSolver, Iterate, Multistage, Problem, SolveStatus,
};
pub use convergence::ConvergenceParams;
pub use error::OptimError;
pub use line_search::WolfeParams;
pub use objective::{CompiledObjective, FnObjective, Objective};
pub use result::{OptimResult, TerminationReason};
pub use solvers::lbfgs::{lbfgs, optimize, optimize_with, LbfgsConfig};
