use super::{BinaryOp, Expr, Graph, Node, UnaryOp, Var};
use crate::error::{Error, Result};
use crate::opcode::UNUSED;

impl Graph {
    /// Rebuild `root` with `variables[k]` replaced by the constant `values[k]`.
    ///
    /// Subexpressions that no longer depend on any free variable fold to a
    /// single constant. Subexpressions that are unaffected by the binding are
    /// returned unchanged, so sharing with the original expression is kept.
    /// Variables not listed stay free.
    pub fn substitute(&mut self, root: Expr, variables: &[Var], values: &[f64]) -> Result<Expr> {
        if variables.len() != values.len() {
            return Err(Error::LengthMismatch {
                expected: variables.len(),
                found: values.len(),
            });
        }
        let order = self.reachable(root)?;

        let mut slots = vec![UNUSED; self.len()];
        self.bind_slots(variables, &mut slots, 0)?;

        // image[i] is the node that replaces node i.
        let mut image: Vec<Expr> = (0..=root.0).map(Expr).collect();
        for i in order {
            let node = self.node_at(i).clone();
            let mapped = match node {
                Node::Constant(_) => continue,
                Node::Variable(_) => {
                    let slot = slots[i as usize];
                    if slot == UNUSED {
                        continue;
                    }
                    self.constant(values[slot as usize])
                }
                Node::Unary { op, arg } => {
                    let a = image[arg.index()];
                    if a == arg {
                        continue;
                    }
                    match op {
                        UnaryOp::Negate => self.neg(a),
                        UnaryOp::Exp => self.exp(a),
                        UnaryOp::Log => self.ln(a),
                    }
                }
                Node::Binary { op, lhs, rhs } => {
                    let (a, b) = (image[lhs.index()], image[rhs.index()]);
                    if a == lhs && b == rhs {
                        continue;
                    }
                    match op {
                        BinaryOp::Add => self.add(a, b),
                        BinaryOp::Multiply => self.mul(a, b),
                    }
                }
                Node::Power { base, exponent } => {
                    let b = image[base.index()];
                    if b == base {
                        continue;
                    }
                    self.pow(b, exponent)
                }
                Node::Sum(terms) => {
                    let mapped: Vec<Expr> = terms.iter().map(|t| image[t.index()]).collect();
                    if mapped == terms {
                        continue;
                    }
                    self.sum(mapped)
                }
            };
            image[i as usize] = mapped;
        }
        Ok(image[root.index()])
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Graph, Node};

    #[test]
    fn fully_bound_expression_folds_to_constant() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.scope(|| x * y + x.exp());
        let c = g.substitute(f, &[x, y], &[0.0, 4.0]).unwrap();
        assert_eq!(g.node(c).unwrap(), &Node::Constant(1.0));
    }

    #[test]
    fn partial_binding_keeps_free_variables() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let f = g.scope(|| x * y);
        let h = g.substitute(f, &[y], &[3.0]).unwrap();
        assert_eq!(g.variables_of(h).unwrap(), vec![x]);
        let grad = crate::differentiate(&g, h, &[x], &[2.0]).unwrap();
        assert_eq!(grad, vec![3.0]);
    }

    #[test]
    fn untouched_subexpressions_are_shared() {
        let mut g = Graph::new();
        let x = g.variable();
        let y = g.variable();
        let sx = g.square(x);
        let f = g.add(sx, y);
        let h = g.substitute(f, &[y], &[1.0]).unwrap();
        match g.node(h).unwrap() {
            Node::Binary { lhs, .. } => assert_eq!(*lhs, sx),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut g = Graph::new();
        let x = g.variable();
        assert!(g.substitute(x.expr(), &[x], &[]).is_err());
    }
}
