//! Operator kinds for symbolic expressions.
//!
//! [`OperatorKind`] names the operation an [`Operator`](super::ExprKind::Operator) node applies
//! to its operands, and knows how to fold concrete operand values into a result masked to the
//! node width. Operand order is significant for the non-commutative kinds (`Sub`, `Div`, `Mod`
//! and the shifts) and is never reordered by this crate.

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::Result;

/// The operation applied by an operator node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum OperatorKind {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction (`left - right`).
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Unsigned division.
    Div,
    /// Unsigned remainder.
    Mod,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Logical shift left.
    Shl,
    /// Logical shift right.
    Shr,
    /// Arithmetic shift right, sign taken from the top bit of the node width.
    Sar,
    /// Two's complement negation.
    Neg,
    /// Bitwise complement.
    Not,
}

impl OperatorKind {
    /// Number of operands this operator takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Neg | Self::Not => 1,
            _ => 2,
        }
    }

    /// Returns `true` for operators whose operands may be swapped without changing the result.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor
        )
    }

    /// Returns `true` for single-operand operators.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        self.arity() == 1
    }

    /// The infix (or prefix, for unary kinds) symbol used when printing expressions.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub | Self::Neg => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Sar => "s>>",
            Self::Not => "~",
        }
    }

    /// Folds concrete operand values into the operator result, masked to `width` bytes.
    ///
    /// # Arguments
    ///
    /// * `operands` - Solved operand values, in operand order.
    /// * `width` - Width of the operator node in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Evaluation`] on a division or remainder by zero, and
    /// [`crate::Error::MalformedTree`] if the operand count does not match [`Self::arity`]
    /// or the width is zero.
    pub fn apply(self, operands: &[u64], width: u8) -> Result<u64> {
        if operands.len() != self.arity() {
            return Err(malformed_error!(
                "operator {:?} expects {} operands, got {}",
                self,
                self.arity(),
                operands.len()
            ));
        }
        if width == 0 {
            return Err(malformed_error!("operator {:?} has a zero width", self));
        }

        let mask = width_mask(width);
        let bits = u32::from(width.min(8)) * 8;
        let left = operands[0] & mask;

        let value = if self.is_unary() {
            match self {
                Self::Neg => left.wrapping_neg(),
                _ => !left,
            }
        } else {
            let right = operands[1] & mask;
            match self {
                Self::Add => left.wrapping_add(right),
                Self::Sub => left.wrapping_sub(right),
                Self::Mul => left.wrapping_mul(right),
                Self::Div => {
                    if right == 0 {
                        return Err(evaluation_error!("division by zero ({:#x} / 0)", left));
                    }
                    left / right
                }
                Self::Mod => {
                    if right == 0 {
                        return Err(evaluation_error!("remainder by zero ({:#x} % 0)", left));
                    }
                    left % right
                }
                Self::And => left & right,
                Self::Or => left | right,
                Self::Xor => left ^ right,
                Self::Shl => {
                    if right >= u64::from(bits) {
                        0
                    } else {
                        left << right
                    }
                }
                Self::Shr => {
                    if right >= u64::from(bits) {
                        0
                    } else {
                        left >> right
                    }
                }
                _ => {
                    let signed = sign_extend(left, bits);
                    let amount = right.min(u64::from(bits) - 1);
                    (signed >> amount) as u64
                }
            }
        };

        Ok(value & mask)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Bit mask covering `width` bytes. Widths of 8 or more cover the full 64 bits.
#[must_use]
pub const fn width_mask(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width as u32 * 8)) - 1
    }
}

fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
