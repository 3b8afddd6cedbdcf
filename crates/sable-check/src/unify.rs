//! Unification and coercion: conforming an expression to a target type.
//!
//! This is the single gate through which an already-typed node may change
//! type. It promotes unsized numeric literals, resolves auto-casts,
//! adopts inferred struct/array literals, and rewrites unary-field-access
//! sugar against the target. Overload and macro logic live with the call
//! sites, never here.

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, TypeMatch};
use crate::types::Type;
use crate::Checker;

impl Checker {
    /// The `TYPE_CHECK` discipline: unify, yielding at the expression's own
    /// position when information is missing. `Ok(true)` means unified;
    /// `Ok(false)` lets the caller produce its own error.
    pub(crate) fn unify(&mut self, expr: NodeId, target: TypeId) -> CheckResult<bool> {
        match self.unify_node_and_type(expr, target) {
            TypeMatch::Success => Ok(true),
            TypeMatch::Failed => Ok(false),
            TypeMatch::Yield => {
                let span = self.span_of(expr);
                Err(self.yield_now(span, "type checking"))
            }
        }
    }

    pub fn unify_node_and_type(&mut self, expr: NodeId, target: TypeId) -> TypeMatch {
        // `.Name` sugar resolves against whatever type context provides.
        if let NodeKind::UnaryFieldAccess { field } = &self.ast.node(expr).kind {
            let field = field.clone();
            return self.resolve_unary_field_access(expr, &field, target);
        }

        // Auto-cast commits to the target if the cast is legal.
        if let NodeKind::Unary { op: UnaryOp::AutoCast, expr: inner } = self.ast.node(expr).kind {
            let Some(inner_ty) = self.ty_of(inner) else {
                return TypeMatch::Yield;
            };
            return match self.cast_is_legal(inner_ty, target) {
                Ok(()) => {
                    self.set_ty(expr, target);
                    TypeMatch::Success
                }
                Err(_) => TypeMatch::Failed,
            };
        }

        let Some(ty) = self.ty_of(expr) else {
            return self.adopt_untyped(expr, target);
        };

        if ty == target {
            return TypeMatch::Success;
        }

        if self.types.compatible(ty, target) {
            if self.types.is_unsized_literal(ty) {
                return self.convert_numlit_to_type(expr, target);
            }
            return TypeMatch::Success;
        }

        // Sized arrays decay to slices of the same element.
        if let (Type::Array { elem: ae, .. }, Type::Slice { elem: se }) =
            (self.types.get(ty), self.types.get(target))
        {
            if ae == se {
                return TypeMatch::Success;
            }
        }

        TypeMatch::Failed
    }

    /// Give an inferred struct or array literal the target type and check
    /// it against that type immediately.
    fn adopt_untyped(&mut self, expr: NodeId, target: TypeId) -> TypeMatch {
        match &self.ast.node(expr).kind {
            NodeKind::StructLiteral(def) if def.stnode.is_none() => {
                self.set_ty(expr, target);
                match self.check_struct_literal(expr) {
                    Ok(()) => TypeMatch::Success,
                    Err(Interrupt::Yield) => TypeMatch::Yield,
                    Err(_) => TypeMatch::Failed,
                }
            }
            NodeKind::ArrayLiteral { atnode: None, .. }
                if matches!(self.types.get(target), Type::Array { .. }) =>
            {
                self.set_ty(expr, target);
                self.add_flag(expr, NodeFlags::ARRAY_LITERAL_TYPED);
                match self.check_array_literal(expr) {
                    Ok(()) => TypeMatch::Success,
                    Err(Interrupt::Yield) => TypeMatch::Yield,
                    Err(_) => TypeMatch::Failed,
                }
            }
            _ => TypeMatch::Yield,
        }
    }

    fn resolve_unary_field_access(
        &mut self,
        expr: NodeId,
        field: &str,
        target: TypeId,
    ) -> TypeMatch {
        match self.types.get(target) {
            Type::Enum(en) => {
                let Some(&(_, value)) = en.values.iter().find(|(name, _)| name == field) else {
                    return TypeMatch::Failed;
                };
                let span = self.span_of(expr);
                let mut lit = Node::new(NodeKind::NumLit {
                    value: NumValue::Int(value),
                });
                lit.span = span;
                lit.ty = Some(target);
                lit.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
                let lit = self.ast.alloc(lit);

                let mut ev = Node::new(NodeKind::EnumValue {
                    name: field.to_string(),
                    value: Some(lit),
                });
                ev.span = span;
                ev.ty = Some(target);
                ev.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
                self.ast.replace(expr, ev);
                TypeMatch::Success
            }
            _ => TypeMatch::Failed,
        }
    }

    /// Commit an unsized numeric literal to the target type, checking that
    /// the value fits.
    pub(crate) fn convert_numlit_to_type(&mut self, expr: NodeId, target: TypeId) -> TypeMatch {
        let value = match &self.ast.node(expr).kind {
            NodeKind::NumLit { value } => *value,
            // A non-literal expression of literal type (folded tree) just
            // takes the target type.
            _ => {
                self.set_ty(expr, target);
                return TypeMatch::Success;
            }
        };

        match value {
            NumValue::Int(v) => {
                if self.types.is_integer(target) || self.types.is_enum(target) {
                    if self.int_fits(v, target) {
                        self.set_ty(expr, target);
                        TypeMatch::Success
                    } else {
                        TypeMatch::Failed
                    }
                } else if self.types.is_float(target) {
                    self.ast.node_mut(expr).kind = NodeKind::NumLit {
                        value: NumValue::Float(v as f64),
                    };
                    self.set_ty(expr, target);
                    TypeMatch::Success
                } else {
                    TypeMatch::Failed
                }
            }
            NumValue::Float(_) => {
                if self.types.is_float(target) {
                    self.set_ty(expr, target);
                    TypeMatch::Success
                } else {
                    TypeMatch::Failed
                }
            }
            NumValue::Bool(_) => {
                if self.types.is_bool(target) {
                    self.set_ty(expr, target);
                    TypeMatch::Success
                } else {
                    TypeMatch::Failed
                }
            }
        }
    }

    pub(crate) fn int_fits(&self, v: i64, target: TypeId) -> bool {
        use crate::types::BasicKind::*;
        match self.types.get(target) {
            Type::Basic { kind, .. } => match kind {
                I8 => i8::try_from(v).is_ok(),
                I16 => i16::try_from(v).is_ok(),
                I32 => i32::try_from(v).is_ok(),
                I64 | IntUnsized => true,
                U8 => u8::try_from(v).is_ok(),
                U16 => u16::try_from(v).is_ok(),
                U32 => u32::try_from(v).is_ok(),
                U64 => v >= 0,
                _ => false,
            },
            Type::Enum(_) => true,
            _ => false,
        }
    }

    /// Whether a `cast(T) x` from `src` to `dst` is representable.
    pub(crate) fn cast_is_legal(&self, src: TypeId, dst: TypeId) -> Result<(), CheckError> {
        if src == dst {
            return Ok(());
        }

        let numeric = |t: TypeId| self.types.is_numeric(t) || self.types.is_bool(t);
        let pointer = |t: TypeId| self.types.is_pointer(t);
        let word = |t: TypeId| {
            self.types.is_integer(t) && self.types.size_of(t) == 8
        };

        let ok = (numeric(src) && numeric(dst))
            || (pointer(src) && pointer(dst))
            || (pointer(src) && word(dst))
            || (word(src) && pointer(dst))
            || (self.types.is_enum(src) && self.types.is_integer(dst))
            || (self.types.is_integer(src) && self.types.is_enum(dst));

        if ok {
            Ok(())
        } else {
            Err(CheckError::BadCast(format!(
                "cannot cast from '{}' to '{}'",
                self.types.name(src),
                self.types.name(dst)
            )))
        }
    }
}
