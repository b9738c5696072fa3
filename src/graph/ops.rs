//! `std::ops` implementations for [`Expr`] and [`Var`].
//!
//! Each operator records into the graph made active by [`Graph::scope`].
//! Using an operator outside a scope panics.

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::thread_local::with_active_graph;
use super::{Expr, Graph, Var};

/// Anything that can stand in as an operand of a graph operator.
///
/// Plain `f64` values become constant nodes.
pub trait Operand: Copy {
    fn to_expr(self, graph: &mut Graph) -> Expr;
}

impl Operand for Expr {
    #[inline]
    fn to_expr(self, _graph: &mut Graph) -> Expr {
        self
    }
}

impl Operand for Var {
    #[inline]
    fn to_expr(self, _graph: &mut Graph) -> Expr {
        self.expr
    }
}

impl Operand for f64 {
    #[inline]
    fn to_expr(self, graph: &mut Graph) -> Expr {
        graph.constant(self)
    }
}

#[inline]
fn record<A: Operand, B: Operand>(
    a: A,
    b: B,
    build: impl FnOnce(&mut Graph, Expr, Expr) -> Expr,
) -> Expr {
    with_active_graph(|g| {
        let a = a.to_expr(g);
        let b = b.to_expr(g);
        build(g, a, b)
    })
}

macro_rules! binary_ops {
    ($($lhs:ty, $rhs:ty);* $(;)?) => {$(
        impl Add<$rhs> for $lhs {
            type Output = Expr;
            #[inline]
            fn add(self, rhs: $rhs) -> Expr {
                record(self, rhs, |g, a, b| g.add(a, b))
            }
        }

        impl Sub<$rhs> for $lhs {
            type Output = Expr;
            #[inline]
            fn sub(self, rhs: $rhs) -> Expr {
                record(self, rhs, |g, a, b| g.sub(a, b))
            }
        }

        impl Mul<$rhs> for $lhs {
            type Output = Expr;
            #[inline]
            fn mul(self, rhs: $rhs) -> Expr {
                record(self, rhs, |g, a, b| g.mul(a, b))
            }
        }

        impl Div<$rhs> for $lhs {
            type Output = Expr;
            #[inline]
            fn div(self, rhs: $rhs) -> Expr {
                record(self, rhs, |g, a, b| g.div(a, b))
            }
        }
    )*};
}

binary_ops! {
    Expr, Expr;
    Expr, Var;
    Var, Expr;
    Var, Var;
    Expr, f64;
    f64, Expr;
    Var, f64;
    f64, Var;
}

impl Neg for Expr {
    type Output = Expr;
    #[inline]
    fn neg(self) -> Expr {
        with_active_graph(|g| g.neg(self))
    }
}

impl Neg for Var {
    type Output = Expr;
    #[inline]
    fn neg(self) -> Expr {
        with_active_graph(|g| g.neg(self))
    }
}

impl std::iter::Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Expr {
        // Collect first: the iterator may itself record nodes.
        let terms: Vec<Expr> = iter.collect();
        with_active_graph(|g| g.sum(terms))
    }
}

impl Expr {
    /// `e ^ self`, recorded into the active graph.
    #[inline]
    pub fn exp(self) -> Expr {
        with_active_graph(|g| g.exp(self))
    }

    /// Natural logarithm, recorded into the active graph.
    #[inline]
    pub fn ln(self) -> Expr {
        with_active_graph(|g| g.ln(self))
    }

    #[inline]
    pub fn powf(self, exponent: f64) -> Expr {
        with_active_graph(|g| g.pow(self, exponent))
    }

    #[inline]
    pub fn powi(self, n: i32) -> Expr {
        with_active_graph(|g| g.powi(self, n))
    }

    #[inline]
    pub fn square(self) -> Expr {
        with_active_graph(|g| g.square(self))
    }
}

impl Var {
    #[inline]
    pub fn exp(self) -> Expr {
        self.expr().exp()
    }

    #[inline]
    pub fn ln(self) -> Expr {
        self.expr().ln()
    }

    #[inline]
    pub fn powf(self, exponent: f64) -> Expr {
        self.expr().powf(exponent)
    }

    #[inline]
    pub fn powi(self, n: i32) -> Expr {
        self.expr().powi(n)
    }

    #[inline]
    pub fn square(self) -> Expr {
        self.expr().square()
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{BinaryOp, Graph, Node};

    #[test]
    fn operators_record_into_scope() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.scope(|| x * y + 1.0);
        match g.node(f).unwrap() {
            Node::Binary {
                op: BinaryOp::Add, ..
            } => {}
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[test]
    fn iterator_sum_builds_one_node() {
        let mut g = Graph::new();
        let xs = g.variables(4);
        let f = g.scope(|| xs.iter().map(|&v| v.expr().square()).sum::<crate::Expr>());
        match g.node(f).unwrap() {
            Node::Sum(terms) => assert_eq!(terms.len(), 4),
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[test]
    fn nested_scopes_restore_outer_graph() {
        let mut outer = Graph::new();
        let x = outer.variable();
        let f = outer.scope(|| {
            let mut inner = Graph::new();
            let z = inner.variable();
            let _ = inner.scope(|| z * 2.0);
            x * 3.0
        });
        assert!(outer.node(f).is_ok());
    }

    #[test]
    #[should_panic(expected = "No active graph")]
    fn operator_outside_scope_panics() {
        let mut g = Graph::new();
        let x = g.variable();
        let _ = x + 1.0;
    }
}
