//! Fixed-length vectors of expressions.
//!
//! Every operation records into an explicit [`Graph`], so vectors can be
//! assembled outside [`Graph::scope`].

use std::ops::Index;

use crate::graph::{Expr, Graph, Var};

/// A vector whose components are expressions in one graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExprVec(Vec<Expr>);

impl ExprVec {
    pub fn new(components: Vec<Expr>) -> Self {
        ExprVec(components)
    }

    /// A vector of the given variables.
    pub fn from_vars(vars: &[Var]) -> Self {
        ExprVec(vars.iter().map(|v| v.expr()).collect())
    }

    /// A vector of constant nodes.
    pub fn constant(graph: &mut Graph, values: &[f64]) -> Self {
        ExprVec(values.iter().map(|&v| graph.constant(v)).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn components(&self) -> &[Expr] {
        &self.0
    }

    pub fn into_components(self) -> Vec<Expr> {
        self.0
    }

    /// Component-wise `self + other`.
    pub fn add(&self, graph: &mut Graph, other: &ExprVec) -> ExprVec {
        self.zip_with(other, |a, b| graph.add(a, b))
    }

    /// Component-wise `self - other`.
    pub fn sub(&self, graph: &mut Graph, other: &ExprVec) -> ExprVec {
        self.zip_with(other, |a, b| graph.sub(a, b))
    }

    /// Every component multiplied by `factor`.
    pub fn scale(&self, graph: &mut Graph, factor: impl Into<Expr>) -> ExprVec {
        let factor = factor.into();
        ExprVec(self.0.iter().map(|&a| graph.mul(factor, a)).collect())
    }

    pub fn neg(&self, graph: &mut Graph) -> ExprVec {
        ExprVec(self.0.iter().map(|&a| graph.neg(a)).collect())
    }

    /// Inner product, built as one N-ary sum of products.
    pub fn dot(&self, graph: &mut Graph, other: &ExprVec) -> Expr {
        let products = self.zip_with(other, |a, b| graph.mul(a, b));
        graph.sum(products.0)
    }

    /// Sum of squared components.
    pub fn norm_squared(&self, graph: &mut Graph) -> Expr {
        let squares: Vec<Expr> = self.0.iter().map(|&a| graph.square(a)).collect();
        graph.sum(squares)
    }

    /// 3D cross product.
    ///
    /// # Panics
    /// If either vector does not have exactly three components.
    pub fn cross(&self, graph: &mut Graph, other: &ExprVec) -> ExprVec {
        assert!(
            self.len() == 3 && other.len() == 3,
            "cross product needs two 3-vectors, got {} and {}",
            self.len(),
            other.len()
        );
        let (a, b) = (&self.0, &other.0);
        let mut component = |i: usize, j: usize| {
            let p = graph.mul(a[i], b[j]);
            let q = graph.mul(a[j], b[i]);
            graph.sub(p, q)
        };
        ExprVec(vec![component(1, 2), component(2, 0), component(0, 1)])
    }

    fn zip_with(&self, other: &ExprVec, mut f: impl FnMut(Expr, Expr) -> Expr) -> ExprVec {
        assert_eq!(
            self.len(),
            other.len(),
            "vector length mismatch: {} vs {}",
            self.len(),
            other.len()
        );
        ExprVec(self.0.iter().zip(&other.0).map(|(&a, &b)| f(a, b)).collect())
    }
}

impl Index<usize> for ExprVec {
    type Output = Expr;

    #[inline]
    fn index(&self, i: usize) -> &Expr {
        &self.0[i]
    }
}

impl FromIterator<Expr> for ExprVec {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        ExprVec(iter.into_iter().collect())
    }
}

impl From<Vec<Expr>> for ExprVec {
    fn from(components: Vec<Expr>) -> Self {
        ExprVec(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_norm() {
        let mut g = Graph::new();
        let xs = g.variables(3);
        let v = ExprVec::from_vars(&xs);
        let w = ExprVec::constant(&mut g, &[1.0, 2.0, 3.0]);
        let d = v.dot(&mut g, &w);
        let n = v.norm_squared(&mut g);
        let point = [1.0, -1.0, 2.0];
        assert_eq!(crate::evaluate(&g, d, &xs, &point).unwrap(), 5.0);
        assert_eq!(crate::evaluate(&g, n, &xs, &point).unwrap(), 6.0);
        assert_eq!(
            crate::differentiate(&g, n, &xs, &point).unwrap(),
            vec![2.0, -2.0, 4.0]
        );
    }

    #[test]
    fn cross_of_unit_vectors() {
        let mut g = Graph::new();
        let e1 = ExprVec::constant(&mut g, &[1.0, 0.0, 0.0]);
        let e2 = ExprVec::constant(&mut g, &[0.0, 1.0, 0.0]);
        let e3 = e1.cross(&mut g, &e2);
        let values: Vec<f64> = e3
            .components()
            .iter()
            .map(|&c| crate::evaluate(&g, c, &[], &[]).unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn add_sub_scale() {
        let mut g = Graph::new();
        let xs = g.variables(2);
        let v = ExprVec::from_vars(&xs);
        let w = ExprVec::constant(&mut g, &[10.0, 20.0]);
        let two = g.constant(2.0);
        let r = v.add(&mut g, &w).scale(&mut g, two).sub(&mut g, &w);
        let values: Vec<f64> = r
            .components()
            .iter()
            .map(|&c| crate::evaluate(&g, c, &xs, &[1.0, 2.0]).unwrap())
            .collect();
        assert_eq!(values, vec![12.0, 24.0]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn mismatched_lengths_panic() {
        let mut g = Graph::new();
        let a = ExprVec::constant(&mut g, &[1.0]);
        let b = ExprVec::constant(&mut g, &[1.0, 2.0]);
        let _ = a.add(&mut g, &b);
    }
}
