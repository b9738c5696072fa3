use crate::error::Result;
use crate::opcode::{self, OpCode, UNUSED};

impl super::CompiledTerm {
    /// Forward sweep into an external values buffer.
    ///
    /// `values_buf` is resized to the tape length; on success it holds the
    /// value of every slot.
    pub(crate) fn forward_into(&self, point: &[f64], params: &[f64], values_buf: &mut Vec<f64>) -> Result<()> {
        self.check_lengths(point, params)?;

        let n = self.opcodes.len();
        values_buf.clear();
        values_buf.extend_from_slice(&self.constants);

        let ni = self.num_inputs as usize;
        values_buf[..ni].copy_from_slice(point);
        values_buf[ni..ni + params.len()].copy_from_slice(params);

        for i in ni + params.len()..n {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => continue,
                OpCode::Sum => {
                    let [offset, len] = self.arg_indices[i];
                    let operands = &self.nary_args[offset as usize..(offset + len) as usize];
                    values_buf[i] = operands.iter().map(|&s| values_buf[s as usize]).sum();
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = values_buf[a_idx as usize];
                    let b = if b_idx != UNUSED {
                        values_buf[b_idx as usize]
                    } else {
                        0.0
                    };
                    values_buf[i] = opcode::eval_forward(op, a, b)?;
                }
            }
        }
        Ok(())
    }
}
