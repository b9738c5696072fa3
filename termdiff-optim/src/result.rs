use std::fmt;

/// Result of an optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimResult<F> {
    /// Best point found.
    pub x: Vec<F>,
    /// Objective value at `x`.
    pub value: F,
    /// Gradient at `x`.
    pub gradient: Vec<F>,
    pub gradient_norm: F,
    /// Number of accepted steps.
    pub iterations: usize,
    /// Total number of objective function evaluations.
    pub func_evals: usize,
    pub termination: TerminationReason,
}

impl<F> OptimResult<F> {
    /// True when a tolerance was met, as opposed to running out of iterations
    /// or failing to make progress.
    pub fn converged(&self) -> bool {
        matches!(
            self.termination,
            TerminationReason::GradientNorm
                | TerminationReason::StepSize
                | TerminationReason::FunctionChange
        )
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Gradient norm fell below tolerance.
    GradientNorm,
    /// Step size fell below tolerance.
    StepSize,
    /// Change in objective value fell below tolerance.
    FunctionChange,
    /// Reached the maximum number of iterations.
    MaxIterations,
    /// Line search could not find a decrease along the search direction.
    LineSearchFailed,
    /// The objective is not finite at the start point.
    NumericalError,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TerminationReason::GradientNorm => "gradient norm below tolerance",
            TerminationReason::StepSize => "step size below tolerance",
            TerminationReason::FunctionChange => "function change below tolerance",
            TerminationReason::MaxIterations => "maximum iterations reached",
            TerminationReason::LineSearchFailed => "line search failed",
            TerminationReason::NumericalError => "non-finite objective at start point",
        };
        f.write_str(reason)
    }
}
