//! Compile-time evaluation.
//!
//! Covers what the rest of the analyser needs: integer, boolean and string
//! literals, folding of the integer arithmetic/bitwise/shift operators,
//! comparisons, and the logical connectives. Anything else evaluates to
//! "not a constant".

use crate::ast::{BinaryOp, CastKind, ConstValue, NodeId, NodeKind, UnaryOp};

use super::Sema;

impl Sema<'_, '_> {
    pub(crate) fn const_eval(&self, node: NodeId) -> Option<ConstValue> {
        match &self.local_node(node).kind {
            NodeKind::LitInt { value } => Some(ConstValue::Int(*value as i64)),
            NodeKind::LitBool { value } => Some(ConstValue::Bool(*value)),
            NodeKind::LitString { value } => Some(ConstValue::String(*value)),
            NodeKind::LitRune { value } => Some(ConstValue::Int(*value as i64)),
            NodeKind::EvaluatedConstant { value, .. } => Some(value.clone()),
            NodeKind::Cast { cast_kind, operand, .. } => match cast_kind {
                CastKind::Implicit | CastKind::LvalueToRvalue | CastKind::Soft => {
                    self.const_eval(*operand)
                }
                _ => None,
            },
            NodeKind::Unary { op, operand } => {
                let value = self.const_eval(*operand)?;
                match (op, value) {
                    (UnaryOp::Pos, ConstValue::Int(v)) => Some(ConstValue::Int(v)),
                    (UnaryOp::Neg, ConstValue::Int(v)) => Some(ConstValue::Int(v.wrapping_neg())),
                    (UnaryOp::Compl, ConstValue::Int(v)) => Some(ConstValue::Int(!v)),
                    (UnaryOp::Not, ConstValue::Bool(v)) => Some(ConstValue::Bool(!v)),
                    _ => None,
                }
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let lhs = self.const_eval(*lhs)?;
                let rhs = self.const_eval(*rhs)?;
                fold_binary(*op, lhs, rhs)
            }
            _ => None,
        }
    }
}

fn fold_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    use ConstValue::{Bool, Int};
    match (op, lhs, rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => Some(Int(a.wrapping_add(b))),
        (BinaryOp::Sub, Int(a), Int(b)) => Some(Int(a.wrapping_sub(b))),
        (BinaryOp::Mul, Int(a), Int(b)) => Some(Int(a.wrapping_mul(b))),
        (BinaryOp::Div, Int(a), Int(b)) => {
            if b == 0 {
                None
            } else {
                Some(Int(a.wrapping_div(b)))
            }
        }
        (BinaryOp::Mod, Int(a), Int(b)) => {
            if b == 0 {
                None
            } else {
                Some(Int(a.wrapping_rem(b)))
            }
        }
        (BinaryOp::BitAnd, Int(a), Int(b)) => Some(Int(a & b)),
        (BinaryOp::BitOr, Int(a), Int(b)) => Some(Int(a | b)),
        (BinaryOp::BitXor, Int(a), Int(b)) => Some(Int(a ^ b)),
        (BinaryOp::Shl, Int(a), Int(b)) => Some(Int(a.wrapping_shl(b as u32))),
        (BinaryOp::Shr, Int(a), Int(b)) => Some(Int(a.wrapping_shr(b as u32))),
        (BinaryOp::Eq, Int(a), Int(b)) => Some(Bool(a == b)),
        (BinaryOp::Ne, Int(a), Int(b)) => Some(Bool(a != b)),
        (BinaryOp::Lt, Int(a), Int(b)) => Some(Bool(a < b)),
        (BinaryOp::Le, Int(a), Int(b)) => Some(Bool(a <= b)),
        (BinaryOp::Gt, Int(a), Int(b)) => Some(Bool(a > b)),
        (BinaryOp::Ge, Int(a), Int(b)) => Some(Bool(a >= b)),
        (BinaryOp::Eq, Bool(a), Bool(b)) => Some(Bool(a == b)),
        (BinaryOp::Ne, Bool(a), Bool(b)) => Some(Bool(a != b)),
        (BinaryOp::LogAnd, Bool(a), Bool(b)) => Some(Bool(a && b)),
        (BinaryOp::LogOr, Bool(a), Bool(b)) => Some(Bool(a || b)),
        (BinaryOp::LogXor, Bool(a), Bool(b)) => Some(Bool(a != b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_integer_arithmetic() {
        assert_eq!(
            fold_binary(BinaryOp::Add, ConstValue::Int(1), ConstValue::Int(2)),
            Some(ConstValue::Int(3))
        );
        assert_eq!(
            fold_binary(BinaryOp::Shl, ConstValue::Int(1), ConstValue::Int(4)),
            Some(ConstValue::Int(16))
        );
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(fold_binary(BinaryOp::Div, ConstValue::Int(1), ConstValue::Int(0)), None);
        assert_eq!(fold_binary(BinaryOp::Mod, ConstValue::Int(1), ConstValue::Int(0)), None);
    }

    #[test]
    fn comparison_folds_to_bool() {
        assert_eq!(
            fold_binary(BinaryOp::Lt, ConstValue::Int(1), ConstValue::Int(2)),
            Some(ConstValue::Bool(true))
        );
    }

    #[test]
    fn logical_connectives_fold() {
        assert_eq!(
            fold_binary(BinaryOp::LogXor, ConstValue::Bool(true), ConstValue::Bool(true)),
            Some(ConstValue::Bool(false))
        );
    }
}
