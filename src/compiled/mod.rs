//! Compiled tape for repeated evaluation of one term.
//!
//! [`compile`](crate::compile) walks the nodes reachable from the root once
//! and flattens them into opcodes with pre-resolved slot indices. After that,
//! each evaluation is a linear forward loop plus a linear reverse loop over
//! the tape, with no graph traversal, hashing, or allocation on the hot path.
//!
//! The tape is immutable. Scratch storage lives either in a thread-local
//! ([`CompiledTerm::evaluate`]) or with the caller
//! ([`CompiledTerm::evaluate_with`]), so one `CompiledTerm` can be shared
//! across threads.

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Expr, Graph, Node, Var};
use crate::opcode::{OpCode, UNUSED};

mod forward;
mod reverse;
mod thread_local;

#[cfg(feature = "parallel")]
mod parallel;

use self::thread_local::with_scratch;

/// Reusable evaluation buffers for a [`CompiledTerm`].
///
/// Buffers grow to the largest tape they have been used with and are never
/// shrunk.
#[derive(Clone, Debug, Default)]
pub struct Scratch {
    pub(crate) values: Vec<f64>,
    pub(crate) adjoints: Vec<f64>,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch::default()
    }
}

/// A term flattened into a re-evaluable tape.
///
/// Slot layout: `0..num_inputs` are the differentiated variables, then
/// `num_params` parameter slots, then constants and operations in
/// topological order.
#[derive(Clone, Debug)]
pub struct CompiledTerm {
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    /// Constant values; input and operation slots hold zero.
    pub(crate) constants: Vec<f64>,
    /// Operand slots of N-ary sums, addressed by `[offset, len]`.
    pub(crate) nary_args: Vec<u32>,
    pub(crate) num_inputs: u32,
    pub(crate) num_params: u32,
    pub(crate) output_index: u32,
}

impl CompiledTerm {
    pub(crate) fn build(graph: &Graph, root: Expr, variables: &[Var], parameters: &[Var]) -> Result<Self> {
        let order = graph.reachable(root)?;

        let mut slots = vec![UNUSED; graph.len()];
        graph.bind_slots(variables, &mut slots, 0)?;
        graph.bind_slots(parameters, &mut slots, variables.len() as u32)?;

        let num_leaves = variables.len() + parameters.len();
        let mut term = CompiledTerm {
            opcodes: vec![OpCode::Input; num_leaves],
            arg_indices: vec![[UNUSED, UNUSED]; num_leaves],
            constants: vec![0.0; num_leaves],
            nary_args: Vec::new(),
            num_inputs: variables.len() as u32,
            num_params: parameters.len() as u32,
            output_index: 0,
        };

        for &i in &order {
            let slot = match *graph.node_at(i) {
                Node::Variable(id) => {
                    if slots[i as usize] == UNUSED {
                        return Err(Error::UnboundVariable(id));
                    }
                    continue;
                }
                Node::Constant(v) => term.push(OpCode::Const, [UNUSED, UNUSED], v),
                Node::Unary { op, arg } => term.push(op.opcode(), [slots[arg.index()], UNUSED], 0.0),
                Node::Binary { op, lhs, rhs } => {
                    term.push(op.opcode(), [slots[lhs.index()], slots[rhs.index()]], 0.0)
                }
                Node::Power { base, exponent } => {
                    let e = term.push(OpCode::Const, [UNUSED, UNUSED], exponent);
                    term.push(OpCode::Powf, [slots[base.index()], e], 0.0)
                }
                Node::Sum(ref terms) => {
                    let offset = term.nary_args.len() as u32;
                    term.nary_args.extend(terms.iter().map(|t| slots[t.index()]));
                    term.push(OpCode::Sum, [offset, terms.len() as u32], 0.0)
                }
            };
            slots[i as usize] = slot;
        }
        term.output_index = slots[root.index()];

        debug!(
            nodes = order.len(),
            tape_len = term.opcodes.len(),
            inputs = term.num_inputs,
            params = term.num_params,
            "compiled term"
        );
        Ok(term)
    }

    #[inline]
    fn push(&mut self, op: OpCode, args: [u32; 2], constant: f64) -> u32 {
        let idx = self.opcodes.len() as u32;
        self.opcodes.push(op);
        self.arg_indices.push(args);
        self.constants.push(constant);
        idx
    }

    /// Number of differentiated variables.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of per-evaluation parameters.
    #[inline]
    pub fn num_params(&self) -> usize {
        self.num_params as usize
    }

    /// Number of tape slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// Gradient and value at `point`.
    ///
    /// ```
    /// let mut g = termdiff::Graph::new();
    /// let x = g.variable();
    /// let f = g.scope(|| 2.0 * x.square());
    /// let term = termdiff::compile(&g, f, &[x]).unwrap();
    /// let (grad, value) = term.evaluate(&[2.0]).unwrap();
    /// assert_eq!(grad, vec![8.0]);
    /// assert_eq!(value, 8.0);
    /// ```
    pub fn evaluate(&self, point: &[f64]) -> Result<(Vec<f64>, f64)> {
        self.evaluate_parametric(point, &[])
    }

    /// Gradient (with respect to the variables only) and value at `point`
    /// with `params` bound to the parameter slots.
    pub fn evaluate_parametric(&self, point: &[f64], params: &[f64]) -> Result<(Vec<f64>, f64)> {
        with_scratch(|scratch| self.evaluate_with(point, params, scratch))
    }

    /// Like [`evaluate_parametric`](Self::evaluate_parametric), using
    /// caller-owned buffers.
    pub fn evaluate_with(&self, point: &[f64], params: &[f64], scratch: &mut Scratch) -> Result<(Vec<f64>, f64)> {
        self.forward_into(point, params, &mut scratch.values)?;
        let value = scratch.values[self.output_index as usize];
        self.reverse_into(&scratch.values, &mut scratch.adjoints);
        Ok((scratch.adjoints[..self.num_inputs as usize].to_vec(), value))
    }

    /// Value at `point` (forward sweep only).
    pub fn value(&self, point: &[f64]) -> Result<f64> {
        self.value_parametric(point, &[])
    }

    pub fn value_parametric(&self, point: &[f64], params: &[f64]) -> Result<f64> {
        with_scratch(|scratch| {
            self.forward_into(point, params, &mut scratch.values)?;
            Ok(scratch.values[self.output_index as usize])
        })
    }

    /// Gradient and value at each point, in order. Stops at the first error.
    pub fn evaluate_batch(&self, points: &[Vec<f64>]) -> Result<Vec<(Vec<f64>, f64)>> {
        let mut scratch = Scratch::new();
        points
            .iter()
            .map(|p| self.evaluate_with(p, &[], &mut scratch))
            .collect()
    }

    fn check_lengths(&self, point: &[f64], params: &[f64]) -> Result<()> {
        if point.len() != self.num_inputs as usize {
            return Err(Error::LengthMismatch {
                expected: self.num_inputs as usize,
                found: point.len(),
            });
        }
        if params.len() != self.num_params as usize {
            return Err(Error::ParameterMismatch {
                expected: self.num_params as usize,
                found: params.len(),
            });
        }
        Ok(())
    }
}
