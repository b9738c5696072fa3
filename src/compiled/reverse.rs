use crate::opcode::{self, OpCode, UNUSED};

impl super::CompiledTerm {
    /// Reverse sweep seeded with 1 at the output slot.
    ///
    /// Reads primal values from `values` (filled by `forward_into`) and
    /// leaves the full adjoint vector in `adjoints`; the first `num_inputs`
    /// entries are the gradient.
    pub(crate) fn reverse_into(&self, values: &[f64], adjoints: &mut Vec<f64>) {
        adjoints.clear();
        adjoints.resize(self.opcodes.len(), 0.0);
        adjoints[self.output_index as usize] = 1.0;

        for i in (0..self.opcodes.len()).rev() {
            let adj = adjoints[i];
            if adj == 0.0 {
                continue;
            }

            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                OpCode::Sum => {
                    let [offset, len] = self.arg_indices[i];
                    for &s in &self.nary_args[offset as usize..(offset + len) as usize] {
                        adjoints[s as usize] += adj;
                    }
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = values[a_idx as usize];
                    let b = if b_idx != UNUSED {
                        values[b_idx as usize]
                    } else {
                        0.0
                    };
                    let (da, db) = opcode::reverse_partials(op, a, b, values[i]);

                    adjoints[a_idx as usize] += da * adj;
                    // The exponent slot of a power is a constant.
                    if b_idx != UNUSED && op != OpCode::Powf {
                        adjoints[b_idx as usize] += db * adj;
                    }
                }
            }
        }
    }
}
