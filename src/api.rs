use crate::compiled::CompiledTerm;
use crate::error::Result;
use crate::eval::Sweep;
use crate::graph::{Expr, Graph, Var};

/// Gradient of `root` with respect to `variables` at `point`.
///
/// `point[k]` is the value bound to `variables[k]`. Variables not reachable
/// from `root` get a zero partial. Every variable reachable from `root` must
/// be bound.
///
/// ```
/// let mut g = termdiff::Graph::new();
/// let x = g.variable();
/// let y = g.variable();
/// let f = g.mul(x, y);
/// let grad = termdiff::differentiate(&g, f, &[x, y], &[3.0, -4.0]).unwrap();
/// assert_eq!(grad, vec![-4.0, 3.0]);
/// ```
pub fn differentiate(graph: &Graph, root: Expr, variables: &[Var], point: &[f64]) -> Result<Vec<f64>> {
    let sweep = Sweep::forward(graph, root, variables, point)?;
    Ok(sweep.gradient(graph, variables.len()))
}

/// Value and gradient of `root` at `point` from one forward and one reverse sweep.
pub fn value_and_gradient(
    graph: &Graph,
    root: Expr,
    variables: &[Var],
    point: &[f64],
) -> Result<(f64, Vec<f64>)> {
    let sweep = Sweep::forward(graph, root, variables, point)?;
    Ok((sweep.value(), sweep.gradient(graph, variables.len())))
}

/// Value of `root` at `point` (forward sweep only).
pub fn evaluate(graph: &Graph, root: Expr, variables: &[Var], point: &[f64]) -> Result<f64> {
    Sweep::forward(graph, root, variables, point).map(|s| s.value())
}

/// Flatten `root` into a reusable tape. Input slot `k` is `variables[k]`.
pub fn compile(graph: &Graph, root: Expr, variables: &[Var]) -> Result<CompiledTerm> {
    CompiledTerm::build(graph, root, variables, &[])
}

/// Like [`compile`], with `parameters` bound per evaluation instead of
/// differentiated. Gradients are taken with respect to `variables` only.
pub fn compile_parametric(
    graph: &Graph,
    root: Expr,
    variables: &[Var],
    parameters: &[Var],
) -> Result<CompiledTerm> {
    CompiledTerm::build(graph, root, variables, parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn unbound_reachable_variable_is_an_error() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.add(x, y);
        assert_eq!(
            differentiate(&g, f, &[x], &[1.0]).unwrap_err(),
            Error::UnboundVariable(y.id())
        );
    }

    #[test]
    fn point_length_must_match() {
        let mut g = Graph::new();
        let x = g.variable();
        assert_eq!(
            evaluate(&g, x.expr(), &[x], &[1.0, 2.0]).unwrap_err(),
            Error::LengthMismatch {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn duplicate_binding_is_an_error() {
        let mut g = Graph::new();
        let x = g.variable();
        assert_eq!(
            differentiate(&g, x.expr(), &[x, x], &[1.0, 2.0]).unwrap_err(),
            Error::DuplicateVariable(x.id())
        );
    }

    #[test]
    fn unreachable_variable_gets_zero() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.square(x);
        let (v, grad) = value_and_gradient(&g, f, &[x, y], &[3.0, 7.0]).unwrap();
        assert_eq!(v, 9.0);
        assert_eq!(grad, vec![6.0, 0.0]);
    }

    #[test]
    fn log_domain_error_surfaces() {
        let mut g = Graph::new();
        let x = g.variable();
        let f = g.ln(x);
        assert_eq!(
            evaluate(&g, f, &[x], &[-1.0]).unwrap_err(),
            Error::LogDomain(-1.0)
        );
    }
}
