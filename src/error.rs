use crate::graph::VarId;

/// Contract violations detected while building bindings, compiling, or
/// evaluating an expression graph.
///
/// Every variant is raised synchronously by the call that received the bad
/// input; nothing in this crate attempts to recover from them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A point or parameter slice does not match the declared variable list.
    #[error("expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    /// A variable reachable from the root has no value in the binding.
    #[error("variable {0} is reachable from the root but is not bound")]
    UnboundVariable(VarId),

    /// The same variable appears twice in a binding.
    #[error("variable {0} is bound more than once")]
    DuplicateVariable(VarId),

    /// An expression handle points outside the graph it was used with.
    #[error("node {index} does not belong to this graph ({len} nodes)")]
    ForeignNode { index: u32, len: usize },

    /// A parametric plan was evaluated with the wrong number of parameters,
    /// or a plain plan was evaluated with parameters.
    #[error("plan takes {expected} parameters, got {found}")]
    ParameterMismatch { expected: usize, found: usize },

    /// Non-integer power of a non-positive base.
    #[error("non-integer power {exponent} of non-positive base {base}")]
    PowerDomain { base: f64, exponent: f64 },

    /// Logarithm of a non-positive argument.
    #[error("logarithm of non-positive argument {0}")]
    LogDomain(f64),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
