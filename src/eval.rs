//! Direct forward/reverse sweep over a graph, without compiling.

use crate::error::{Error, Result};
use crate::graph::{Expr, Graph, Node, Var};
use crate::opcode::{self, OpCode, UNUSED};

/// Primal values of every node reachable from one root.
pub(crate) struct Sweep {
    /// Reachable node indices, ascending.
    order: Vec<u32>,
    /// `slots[node]` is the position of the node's variable in the point.
    slots: Vec<u32>,
    /// Dense up to the root; unreachable entries stay zero.
    values: Vec<f64>,
    root: Expr,
}

impl Sweep {
    /// Bind `point` to `variables` and evaluate every node reachable from `root`.
    pub(crate) fn forward(graph: &Graph, root: Expr, variables: &[Var], point: &[f64]) -> Result<Self> {
        if variables.len() != point.len() {
            return Err(Error::LengthMismatch {
                expected: variables.len(),
                found: point.len(),
            });
        }
        let order = graph.reachable(root)?;
        let mut slots = vec![UNUSED; graph.len()];
        graph.bind_slots(variables, &mut slots, 0)?;

        let mut values = vec![0.0; root.index() + 1];
        for &i in &order {
            values[i as usize] = match *graph.node_at(i) {
                Node::Constant(v) => v,
                Node::Variable(id) => match slots[i as usize] {
                    UNUSED => return Err(Error::UnboundVariable(id)),
                    slot => point[slot as usize],
                },
                Node::Unary { op, arg } => opcode::eval_forward(op.opcode(), values[arg.index()], 0.0)?,
                Node::Binary { op, lhs, rhs } => {
                    opcode::eval_forward(op.opcode(), values[lhs.index()], values[rhs.index()])?
                }
                Node::Power { base, exponent } => {
                    opcode::eval_forward(OpCode::Powf, values[base.index()], exponent)?
                }
                Node::Sum(ref terms) => terms.iter().map(|t| values[t.index()]).sum(),
            };
        }

        Ok(Sweep {
            order,
            slots,
            values,
            root,
        })
    }

    #[inline]
    pub(crate) fn value(&self) -> f64 {
        self.values[self.root.index()]
    }

    /// Reverse sweep seeded with 1 at the root. Returns one partial per bound
    /// variable; variables the root does not reach get zero.
    pub(crate) fn gradient(&self, graph: &Graph, num_variables: usize) -> Vec<f64> {
        let mut gradient = vec![0.0; num_variables];
        let mut adjoints = vec![0.0; self.values.len()];
        adjoints[self.root.index()] = 1.0;

        for &i in self.order.iter().rev() {
            let adj = adjoints[i as usize];
            if adj == 0.0 {
                continue;
            }
            let r = self.values[i as usize];
            match *graph.node_at(i) {
                Node::Constant(_) => {}
                Node::Variable(_) => gradient[self.slots[i as usize] as usize] += adj,
                Node::Unary { op, arg } => {
                    let (da, _) = opcode::reverse_partials(op.opcode(), self.values[arg.index()], 0.0, r);
                    adjoints[arg.index()] += da * adj;
                }
                Node::Binary { op, lhs, rhs } => {
                    let (a, b) = (self.values[lhs.index()], self.values[rhs.index()]);
                    let (da, db) = opcode::reverse_partials(op.opcode(), a, b, r);
                    adjoints[lhs.index()] += da * adj;
                    adjoints[rhs.index()] += db * adj;
                }
                Node::Power { base, exponent } => {
                    let (da, _) = opcode::reverse_partials(OpCode::Powf, self.values[base.index()], exponent, r);
                    adjoints[base.index()] += da * adj;
                }
                Node::Sum(ref terms) => {
                    for t in terms {
                        adjoints[t.index()] += adj;
                    }
                }
            }
        }
        gradient
    }
}
