//! Symbolic expression graphs with reverse-mode differentiation.
//!
//! Build scalar terms over free variables in a [`Graph`], then take exact
//! gradients with [`differentiate`], or [`compile`] a term once and evaluate
//! the resulting [`CompiledTerm`] many times.

pub mod api;
pub mod compiled;
pub mod error;
mod eval;
pub mod graph;
pub mod opcode;
pub mod vector;

pub use api::{compile, compile_parametric, differentiate, evaluate, value_and_gradient};
pub use compiled::{CompiledTerm, Scratch};
pub use error::{Error, Result};
pub use graph::{BinaryOp, Expr, Graph, Node, Operand, UnaryOp, Var, VarId};
pub use vector::ExprVec;
