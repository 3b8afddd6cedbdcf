//! Compile-time reduction of operator trees.
//!
//! When both operands of an operator are compile-time known, the node is
//! rewritten into a literal carrying the already-resolved type. Folding is
//! conservative: anything it cannot evaluate (division by zero, float
//! modulo, overflow) is left in the tree untouched.

use sable_ast::*;

use crate::Checker;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ComptimeValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ComptimeValue {
    fn to_num(self) -> NumValue {
        match self {
            ComptimeValue::Int(v) => NumValue::Int(v),
            ComptimeValue::Float(v) => NumValue::Float(v),
            ComptimeValue::Bool(v) => NumValue::Bool(v),
        }
    }
}

impl Checker {
    pub(crate) fn comptime_value_of(&self, id: NodeId) -> Option<ComptimeValue> {
        match &self.ast.node(id).kind {
            NodeKind::NumLit { value } => Some(match value {
                NumValue::Int(v) => ComptimeValue::Int(*v),
                NumValue::Float(v) => ComptimeValue::Float(*v),
                NumValue::Bool(v) => ComptimeValue::Bool(*v),
            }),
            NodeKind::EnumValue { value: Some(v), .. } => self.comptime_value_of(*v),
            NodeKind::Alias { of } => self.comptime_value_of(*of),
            NodeKind::SizeOf { size: Some(s), .. } => Some(ComptimeValue::Int(*s as i64)),
            NodeKind::AlignOf { alignment: Some(a), .. } => Some(ComptimeValue::Int(*a as i64)),
            _ => None,
        }
    }

    /// Fold a comptime operator node into a literal in place. Nodes that
    /// cannot be evaluated are left alone.
    pub(crate) fn reduce_expression(&mut self, id: NodeId) {
        let folded = match &self.ast.node(id).kind {
            NodeKind::Binary(def) => {
                let (op, left, right) = (def.op, def.left, def.right);
                let l = self.comptime_value_of(left);
                let r = self.comptime_value_of(right);
                match (l, r) {
                    (Some(l), Some(r)) => fold_binary(op, l, r),
                    _ => None,
                }
            }
            NodeKind::Unary { op, expr } => {
                let op = *op;
                self.comptime_value_of(*expr)
                    .and_then(|v| fold_unary(op, v))
            }
            _ => None,
        };

        let Some(value) = folded else { return };

        let node = self.ast.node_mut(id);
        node.kind = NodeKind::NumLit {
            value: value.to_num(),
        };
        node.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
        if matches!(value, ComptimeValue::Bool(_)) {
            node.ty = Some(self.types.basic.bool_);
        }
    }
}

fn fold_binary(op: BinaryOp, l: ComptimeValue, r: ComptimeValue) -> Option<ComptimeValue> {
    use ComptimeValue::*;

    match (l, r) {
        (Int(a), Int(b)) => fold_int(op, a, b),
        (Float(a), Float(b)) => fold_float(op, a, b),
        (Int(a), Float(b)) => fold_float(op, a as f64, b),
        (Float(a), Int(b)) => fold_float(op, a, b as f64),
        (Bool(a), Bool(b)) => fold_bool(op, a, b),
        _ => None,
    }
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<ComptimeValue> {
    use ComptimeValue::*;
    Some(match op {
        BinaryOp::Add => Int(a.checked_add(b)?),
        BinaryOp::Sub => Int(a.checked_sub(b)?),
        BinaryOp::Mul => Int(a.checked_mul(b)?),
        BinaryOp::Div => Int(a.checked_div(b)?),
        BinaryOp::Mod => Int(a.checked_rem(b)?),
        BinaryOp::And => Int(a & b),
        BinaryOp::Or => Int(a | b),
        BinaryOp::Xor => Int(a ^ b),
        BinaryOp::Shl => Int(a.checked_shl(u32::try_from(b).ok()?)?),
        BinaryOp::Sar => Int(a.checked_shr(u32::try_from(b).ok()?)?),
        BinaryOp::Shr => Int(((a as u64).checked_shr(u32::try_from(b).ok()?)?) as i64),
        BinaryOp::Equal => Bool(a == b),
        BinaryOp::NotEqual => Bool(a != b),
        BinaryOp::Less => Bool(a < b),
        BinaryOp::LessEqual => Bool(a <= b),
        BinaryOp::Greater => Bool(a > b),
        BinaryOp::GreaterEqual => Bool(a >= b),
        _ => return None,
    })
}

fn fold_float(op: BinaryOp, a: f64, b: f64) -> Option<ComptimeValue> {
    use ComptimeValue::*;
    Some(match op {
        BinaryOp::Add => Float(a + b),
        BinaryOp::Sub => Float(a - b),
        BinaryOp::Mul => Float(a * b),
        BinaryOp::Div => Float(a / b),
        BinaryOp::Equal => Bool(a == b),
        BinaryOp::NotEqual => Bool(a != b),
        BinaryOp::Less => Bool(a < b),
        BinaryOp::LessEqual => Bool(a <= b),
        BinaryOp::Greater => Bool(a > b),
        BinaryOp::GreaterEqual => Bool(a >= b),
        _ => return None,
    })
}

fn fold_bool(op: BinaryOp, a: bool, b: bool) -> Option<ComptimeValue> {
    use ComptimeValue::*;
    Some(match op {
        BinaryOp::BoolAnd => Bool(a && b),
        BinaryOp::BoolOr => Bool(a || b),
        BinaryOp::Equal => Bool(a == b),
        BinaryOp::NotEqual => Bool(a != b),
        _ => return None,
    })
}

fn fold_unary(op: UnaryOp, v: ComptimeValue) -> Option<ComptimeValue> {
    use ComptimeValue::*;
    Some(match (op, v) {
        (UnaryOp::Negate, Int(a)) => Int(a.checked_neg()?),
        (UnaryOp::Negate, Float(a)) => Float(-a),
        (UnaryOp::Not, Bool(a)) => Bool(!a),
        (UnaryOp::BitwiseNot, Int(a)) => Int(!a),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_folding() {
        assert_eq!(
            fold_binary(BinaryOp::Add, ComptimeValue::Int(2), ComptimeValue::Int(3)),
            Some(ComptimeValue::Int(5))
        );
        assert_eq!(
            fold_binary(BinaryOp::Div, ComptimeValue::Int(2), ComptimeValue::Int(0)),
            None
        );
        assert_eq!(
            fold_binary(BinaryOp::Less, ComptimeValue::Int(2), ComptimeValue::Int(3)),
            Some(ComptimeValue::Bool(true))
        );
    }

    #[test]
    fn unary_folding() {
        assert_eq!(
            fold_unary(UnaryOp::Negate, ComptimeValue::Int(4)),
            Some(ComptimeValue::Int(-4))
        );
        assert_eq!(
            fold_unary(UnaryOp::Not, ComptimeValue::Bool(false)),
            Some(ComptimeValue::Bool(true))
        );
    }
}
