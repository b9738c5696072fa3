//! Elementary operation codes shared by the graph evaluator and the compiled tape.
//!
//! Each opcode represents one node kind. [`eval_forward`] and
//! [`reverse_partials`] evaluate / differentiate a single opcode, so the
//! direct graph sweep and the tape sweep apply exactly the same rules.

use crate::error::{Error, Result};

/// Sentinel used in `arg_indices[1]` for unary ops (the second argument slot is unused).
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes.
///
/// Binary ops use both argument slots. For [`OpCode::Powf`] the second slot
/// holds a constant exponent; for [`OpCode::Sum`] the slots hold an offset and
/// a length into the tape's operand side table.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Structural ──
    /// Bound variable or parameter (leaf).
    Input,
    /// Scalar constant (leaf).
    Const,

    // ── Binary ──
    Add,
    Mul,
    /// Power with a constant exponent.
    Powf,

    // ── Unary ──
    Neg,
    Exp,
    Ln,

    // ── N-ary ──
    Sum,
}

/// True when `exponent` has no fractional part.
#[inline]
pub fn is_integer_exponent(exponent: f64) -> bool {
    exponent.fract() == 0.0
}

/// Evaluate a single opcode in the forward direction.
///
/// For binary ops `a` and `b` are the operand values, for unary ops `b` is
/// ignored, and for [`OpCode::Powf`] `b` is the exponent. Sums are folded by
/// the caller, which owns the operand list.
#[inline]
pub fn eval_forward(op: OpCode, a: f64, b: f64) -> Result<f64> {
    let value = match op {
        OpCode::Input | OpCode::Const => {
            unreachable!("Input/Const values are seeded, not evaluated")
        }
        OpCode::Sum => unreachable!("Sum is accumulated over its operand table"),

        OpCode::Add => a + b,
        OpCode::Mul => a * b,
        OpCode::Powf => {
            if !is_integer_exponent(b) && a <= 0.0 {
                return Err(Error::PowerDomain {
                    base: a,
                    exponent: b,
                });
            }
            a.powf(b)
        }

        OpCode::Neg => -a,
        OpCode::Exp => a.exp(),
        OpCode::Ln => {
            if a <= 0.0 {
                return Err(Error::LogDomain(a));
            }
            a.ln()
        }
    };
    Ok(value)
}

/// Compute reverse-mode partial derivatives for a single opcode.
///
/// Returns `(∂result/∂arg0, ∂result/∂arg1)`. The second partial is zero for
/// unary ops and for [`OpCode::Powf`], whose exponent is a constant.
/// `r` is the result value computed by [`eval_forward`].
#[inline]
pub fn reverse_partials(op: OpCode, a: f64, b: f64, r: f64) -> (f64, f64) {
    match op {
        OpCode::Input | OpCode::Const => (0.0, 0.0),
        OpCode::Sum => (1.0, 0.0),

        OpCode::Add => (1.0, 1.0),
        OpCode::Mul => (b, a),
        OpCode::Powf => {
            // d/da a^n = n * a^(n-1); a zero exponent is a constant.
            if b == 0.0 {
                (0.0, 0.0)
            } else {
                (b * a.powf(b - 1.0), 0.0)
            }
        }

        OpCode::Neg => (-1.0, 0.0),
        OpCode::Exp => (r, 0.0),
        OpCode::Ln => (1.0 / a, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_partial_matches_closed_form() {
        let r = eval_forward(OpCode::Powf, 3.0, 2.0).unwrap();
        assert_eq!(r, 9.0);
        assert_eq!(reverse_partials(OpCode::Powf, 3.0, 2.0, r), (6.0, 0.0));
    }

    #[test]
    fn negative_base_integer_exponent_is_allowed() {
        assert_eq!(eval_forward(OpCode::Powf, -2.0, 3.0).unwrap(), -8.0);
    }

    #[test]
    fn fractional_power_of_negative_base_is_rejected() {
        let err = eval_forward(OpCode::Powf, -4.0, 0.5).unwrap_err();
        assert_eq!(
            err,
            Error::PowerDomain {
                base: -4.0,
                exponent: 0.5
            }
        );
    }

    #[test]
    fn fractional_power_of_zero_is_rejected() {
        assert!(eval_forward(OpCode::Powf, 0.0, 0.5).is_err());
    }

    #[test]
    fn log_of_non_positive_is_rejected() {
        assert_eq!(
            eval_forward(OpCode::Ln, 0.0, 0.0).unwrap_err(),
            Error::LogDomain(0.0)
        );
    }

    #[test]
    fn exp_partial_is_result() {
        let r = eval_forward(OpCode::Exp, 1.0, 0.0).unwrap();
        assert_eq!(reverse_partials(OpCode::Exp, 1.0, 0.0, r).0, r);
    }
}
