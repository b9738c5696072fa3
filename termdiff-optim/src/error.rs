/// Errors returned by the solvers.
///
/// Failing to converge is not an error; it is reported through
/// [`TerminationReason`](crate::TerminationReason) and
/// [`SolveStatus`](crate::SolveStatus).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimError {
    /// A start point or callback result has the wrong length.
    #[error("expected dimension {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A constrained solver's sequence ended without yielding a point.
    #[error("solver produced no iterates")]
    NoIterates,

    /// Building, compiling, or evaluating a term failed.
    #[error(transparent)]
    Expr(#[from] termdiff::Error),
}
