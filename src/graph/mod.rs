//! Arena-backed expression graph.
//!
//! Nodes are appended to a [`Graph`] and addressed by [`Expr`] handles. A node
//! can only reference nodes that already exist, so the graph is acyclic by
//! construction and ascending index order is a topological order. Handles are
//! `Copy`: passing the same handle to several builders shares one node.
//!
//! Nodes are never mutated once pushed. A graph that has been handed to an
//! evaluator or compiler can be read from any number of threads.

use std::fmt;

use crate::error::{Error, Result};
use crate::opcode::{self, OpCode, UNUSED};

mod ops;
mod substitute;
mod thread_local;

pub use self::ops::Operand;
use self::thread_local::GraphGuard;

/// Handle to a node in a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr(pub(crate) u32);

impl Expr {
    /// Position of the node in its graph's arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a free variable, unique within the graph that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub(crate) u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Handle to a Variable node.
///
/// Two handles are equal only when they name the same variable; the value
/// bound to a variable is supplied separately at evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Var {
    pub(crate) id: VarId,
    pub(crate) expr: Expr,
}

impl Var {
    #[inline]
    pub fn id(self) -> VarId {
        self.id
    }

    /// The variable's node, for use as an operand.
    #[inline]
    pub fn expr(self) -> Expr {
        self.expr
    }
}

impl From<Var> for Expr {
    #[inline]
    fn from(var: Var) -> Expr {
        var.expr
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Negate,
    Exp,
    Log,
}

impl UnaryOp {
    #[inline]
    pub fn opcode(self) -> OpCode {
        match self {
            UnaryOp::Negate => OpCode::Neg,
            UnaryOp::Exp => OpCode::Exp,
            UnaryOp::Log => OpCode::Ln,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Multiply,
}

impl BinaryOp {
    #[inline]
    pub fn opcode(self) -> OpCode {
        match self {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Multiply => OpCode::Mul,
        }
    }
}

/// A scalar expression node. The set of kinds is closed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    Constant(f64),
    Variable(VarId),
    Unary { op: UnaryOp, arg: Expr },
    Binary { op: BinaryOp, lhs: Expr, rhs: Expr },
    /// `base ^ exponent` with a constant exponent.
    Power { base: Expr, exponent: f64 },
    Sum(Vec<Expr>),
}

impl Node {
    /// Call `f` on every operand, in order. Shared operands are reported once
    /// per occurrence.
    #[inline]
    pub fn for_each_operand(&self, mut f: impl FnMut(Expr)) {
        match self {
            Node::Constant(_) | Node::Variable(_) => {}
            Node::Unary { arg, .. } => f(*arg),
            Node::Binary { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            Node::Power { base, .. } => f(*base),
            Node::Sum(terms) => terms.iter().copied().for_each(f),
        }
    }
}

/// Append-only arena of expression nodes.
///
/// The graph also owns the variable id counter, so ids are scoped to one
/// graph (one fitting session) and start again from zero in a fresh graph.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Graph {
    nodes: Vec<Node>,
    next_var: u32,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph::default()
    }

    /// Create a graph with room for `est_nodes` nodes.
    pub fn with_capacity(est_nodes: usize) -> Self {
        Graph {
            nodes: Vec::with_capacity(est_nodes),
            next_var: 0,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of variables allocated so far.
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.next_var as usize
    }

    /// Drop every node and restart variable ids at zero.
    ///
    /// Outstanding handles become invalid; evaluating them reports
    /// [`Error::ForeignNode`].
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_var = 0;
    }

    /// Look up a node.
    pub fn node(&self, expr: Expr) -> Result<&Node> {
        self.check(expr)?;
        Ok(&self.nodes[expr.index()])
    }

    /// Run `f` with this graph active on the current thread, so that the
    /// `std::ops` operators on [`Expr`] and [`Var`] record into it.
    ///
    /// ```
    /// let mut graph = termdiff::Graph::new();
    /// let x = graph.variable();
    /// let y = graph.variable();
    /// let f = graph.scope(|| 3.0 * x * y + x);
    /// let g = termdiff::differentiate(&graph, f, &[x, y], &[2.0, 5.0]).unwrap();
    /// assert_eq!(g, vec![16.0, 6.0]);
    /// ```
    pub fn scope<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _guard = GraphGuard::new(self);
        f()
    }

    // ── Builder ──

    /// A constant node.
    pub fn constant(&mut self, value: f64) -> Expr {
        self.push(Node::Constant(value))
    }

    /// A fresh free variable.
    pub fn variable(&mut self) -> Var {
        let id = VarId(self.next_var);
        self.next_var += 1;
        let expr = self.push(Node::Variable(id));
        Var { id, expr }
    }

    /// `n` fresh free variables.
    pub fn variables(&mut self, n: usize) -> Vec<Var> {
        (0..n).map(|_| self.variable()).collect()
    }

    /// `a + b`. Constant operands are folded and `x + 0` returns `x`.
    pub fn add(&mut self, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
        let (a, b) = (self.operand(a), self.operand(b));
        match (self.constant_value(a), self.constant_value(b)) {
            (Some(x), Some(y)) => self.constant(x + y),
            (Some(z), None) if z == 0.0 => b,
            (None, Some(z)) if z == 0.0 => a,
            _ => self.push(Node::Binary {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            }),
        }
    }

    /// `a * b`. Constant operands are folded and `x * 1` returns `x`.
    pub fn mul(&mut self, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
        let (a, b) = (self.operand(a), self.operand(b));
        match (self.constant_value(a), self.constant_value(b)) {
            (Some(x), Some(y)) => self.constant(x * y),
            (Some(one), None) if one == 1.0 => b,
            (None, Some(one)) if one == 1.0 => a,
            _ => self.push(Node::Binary {
                op: BinaryOp::Multiply,
                lhs: a,
                rhs: b,
            }),
        }
    }

    /// `-a`.
    pub fn neg(&mut self, a: impl Into<Expr>) -> Expr {
        let a = self.operand(a);
        if let Some(x) = self.constant_value(a) {
            return self.constant(-x);
        }
        if let Node::Unary {
            op: UnaryOp::Negate,
            arg,
        } = self.nodes[a.index()]
        {
            return arg;
        }
        self.push(Node::Unary {
            op: UnaryOp::Negate,
            arg: a,
        })
    }

    /// `a - b`, built as `a + (-b)`.
    pub fn sub(&mut self, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
        let b = self.neg(b);
        self.add(a, b)
    }

    /// `a / b`, built as `a * b^-1`.
    pub fn div(&mut self, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
        let inv = self.pow(b, -1.0);
        self.mul(a, inv)
    }

    /// `base ^ exponent` for a constant exponent.
    ///
    /// A non-integer exponent requires a positive base at evaluation time;
    /// otherwise evaluation fails with [`Error::PowerDomain`].
    pub fn pow(&mut self, base: impl Into<Expr>, exponent: f64) -> Expr {
        let base = self.operand(base);
        if exponent == 1.0 {
            return base;
        }
        if exponent == 0.0 {
            return self.constant(1.0);
        }
        if let Some(x) = self.constant_value(base) {
            if let Ok(v) = opcode::eval_forward(OpCode::Powf, x, exponent) {
                return self.constant(v);
            }
        }
        self.push(Node::Power { base, exponent })
    }

    /// `base ^ n` for an integer exponent.
    #[inline]
    pub fn powi(&mut self, base: impl Into<Expr>, n: i32) -> Expr {
        self.pow(base, f64::from(n))
    }

    /// `a ^ 2`.
    #[inline]
    pub fn square(&mut self, a: impl Into<Expr>) -> Expr {
        self.pow(a, 2.0)
    }

    /// `e ^ a`.
    pub fn exp(&mut self, a: impl Into<Expr>) -> Expr {
        let a = self.operand(a);
        match self.constant_value(a) {
            Some(x) => self.constant(x.exp()),
            None => self.push(Node::Unary {
                op: UnaryOp::Exp,
                arg: a,
            }),
        }
    }

    /// Natural logarithm. A non-positive argument fails at evaluation time
    /// with [`Error::LogDomain`].
    pub fn ln(&mut self, a: impl Into<Expr>) -> Expr {
        let a = self.operand(a);
        match self.constant_value(a) {
            Some(x) if x > 0.0 => self.constant(x.ln()),
            _ => self.push(Node::Unary {
                op: UnaryOp::Log,
                arg: a,
            }),
        }
    }

    /// N-ary sum.
    ///
    /// Constant terms are folded into one constant; an empty sum is the
    /// constant zero and a single remaining term is returned as-is.
    pub fn sum<I>(&mut self, terms: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut folded = 0.0;
        let mut any_constant = false;
        let mut kept = Vec::new();
        for term in terms {
            let term = self.operand(term);
            match self.constant_value(term) {
                Some(v) => {
                    folded += v;
                    any_constant = true;
                }
                None => kept.push(term),
            }
        }

        if kept.is_empty() {
            return self.constant(folded);
        }
        if any_constant && folded != 0.0 {
            let c = self.constant(folded);
            kept.push(c);
        }
        if kept.len() == 1 {
            return kept[0];
        }
        self.push(Node::Sum(kept))
    }

    // ── Traversal ──

    /// Every variable reachable from `root`, in allocation order.
    pub fn variables_of(&self, root: Expr) -> Result<Vec<Var>> {
        let order = self.reachable(root)?;
        Ok(order
            .into_iter()
            .filter_map(|i| match self.nodes[i as usize] {
                Node::Variable(id) => Some(Var { id, expr: Expr(i) }),
                _ => None,
            })
            .collect())
    }

    /// Indices of every node reachable from `root`, ascending (topological).
    ///
    /// Each node is marked once regardless of how many parents reach it.
    pub(crate) fn reachable(&self, root: Expr) -> Result<Vec<u32>> {
        self.check(root)?;
        let n = root.index() + 1;
        let mut seen = vec![false; n];
        let mut stack = vec![root.0];
        seen[root.index()] = true;

        while let Some(i) = stack.pop() {
            let mut foreign = None;
            self.nodes[i as usize].for_each_operand(|child| {
                // Operands always precede their parent in the arena.
                if child.0 >= i {
                    foreign = Some(child.0);
                } else if !seen[child.index()] {
                    seen[child.index()] = true;
                    stack.push(child.0);
                }
            });
            if let Some(index) = foreign {
                return Err(Error::ForeignNode {
                    index,
                    len: self.nodes.len(),
                });
            }
        }

        Ok(seen
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(i, _)| i as u32)
            .collect())
    }

    /// Write `first_slot + k` into `slots[node]` for the k-th variable.
    ///
    /// `slots` has one entry per node and uses [`UNUSED`] for "not bound".
    /// Rejects foreign handles and variables bound twice (also across
    /// successive calls on the same `slots`).
    pub(crate) fn bind_slots(&self, variables: &[Var], slots: &mut [u32], first_slot: u32) -> Result<()> {
        for (k, var) in variables.iter().enumerate() {
            self.check(var.expr)?;
            match self.nodes[var.expr.index()] {
                Node::Variable(id) if id == var.id => {}
                _ => {
                    return Err(Error::ForeignNode {
                        index: var.expr.0,
                        len: self.nodes.len(),
                    })
                }
            }
            let slot = &mut slots[var.expr.index()];
            if *slot != UNUSED {
                return Err(Error::DuplicateVariable(var.id));
            }
            *slot = first_slot + k as u32;
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn node_at(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }

    #[inline]
    pub(crate) fn check(&self, expr: Expr) -> Result<()> {
        if expr.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::ForeignNode {
                index: expr.0,
                len: self.nodes.len(),
            })
        }
    }

    #[inline]
    fn operand(&self, expr: impl Into<Expr>) -> Expr {
        let expr = expr.into();
        assert!(
            expr.index() < self.nodes.len(),
            "expression handle {} does not belong to this graph ({} nodes)",
            expr.0,
            self.nodes.len()
        );
        expr
    }

    #[inline]
    fn constant_value(&self, expr: Expr) -> Option<f64> {
        match self.nodes[expr.index()] {
            Node::Constant(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    fn push(&mut self, node: Node) -> Expr {
        let idx = self.nodes.len();
        assert!(idx < UNUSED as usize, "expression graph is full");
        self.nodes.push(node);
        Expr(idx as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_operand_is_stored_once() {
        let mut g = Graph::new();
        let x = g.variable();
        let sq = g.mul(x, x);
        let before = g.len();
        let f = g.add(sq, sq);
        assert_eq!(g.len(), before + 1);
        assert_eq!(
            g.node(f).unwrap(),
            &Node::Binary {
                op: BinaryOp::Add,
                lhs: sq,
                rhs: sq
            }
        );
    }

    #[test]
    fn constants_fold() {
        let mut g = Graph::new();
        let a = g.constant(2.0);
        let b = g.constant(3.0);
        let p = g.mul(a, b);
        assert_eq!(g.node(p).unwrap(), &Node::Constant(6.0));
        let s = g.sum([a, b, p]);
        assert_eq!(g.node(s).unwrap(), &Node::Constant(11.0));
    }

    #[test]
    fn identities_return_existing_nodes() {
        let mut g = Graph::new();
        let x = g.variable();
        let zero = g.constant(0.0);
        let one = g.constant(1.0);
        assert_eq!(g.add(x, zero), x.expr());
        assert_eq!(g.mul(one, x), x.expr());
        assert_eq!(g.pow(x, 1.0), x.expr());
        let nx = g.neg(x);
        assert_eq!(g.neg(nx), x.expr());
        assert_eq!(g.sum([x.expr()]), x.expr());
    }

    #[test]
    fn empty_sum_is_zero() {
        let mut g = Graph::new();
        let s = g.sum(Vec::<Expr>::new());
        assert_eq!(g.node(s).unwrap(), &Node::Constant(0.0));
    }

    #[test]
    fn fractional_power_of_negative_constant_is_not_folded() {
        let mut g = Graph::new();
        let c = g.constant(-4.0);
        let p = g.pow(c, 0.5);
        assert!(matches!(g.node(p).unwrap(), Node::Power { .. }));
    }

    #[test]
    fn variable_ids_are_per_graph() {
        let mut g1 = Graph::new();
        let mut g2 = Graph::new();
        assert_eq!(g1.variable().id(), VarId(0));
        assert_eq!(g1.variable().id(), VarId(1));
        assert_eq!(g2.variable().id(), VarId(0));
        g1.clear();
        assert_eq!(g1.variable().id(), VarId(0));
    }

    #[test]
    fn reachable_skips_unrelated_nodes() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let unrelated = g.exp(y);
        let f = g.mul(x, x);
        let order = g.reachable(f).unwrap();
        assert_eq!(order, vec![x.expr().0, f.0]);
        assert!(!order.contains(&unrelated.0));
        assert_eq!(g.variables_of(f).unwrap(), vec![x]);
    }

    #[test]
    fn foreign_handle_is_reported() {
        let g = Graph::new();
        assert_eq!(
            g.node(Expr(3)).unwrap_err(),
            Error::ForeignNode { index: 3, len: 0 }
        );
    }
}
