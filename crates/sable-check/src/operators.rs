//! The binary and unary operator engine: operator-overload lookup,
//! assignment (plain, inferring and compound), comparison and boolean
//! rules, numeric and pointer arithmetic, and the static allow-matrix.

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Resolution};
use crate::types::{BasicFlags, Type};
use crate::{Checker, CheckingLevel};

impl Checker {
    pub(crate) fn report_bad_binaryop(
        &mut self,
        span: Span,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    ) -> Interrupt {
        let left = self.type_name_of(left);
        let right = self.type_name_of(right);
        self.error(
            span,
            CheckError::BadBinaryOp {
                op: op.symbol(),
                left,
                right,
            },
        )
    }

    /// Build (or reuse) the argument tuple for an operator overload and ask
    /// the overload picker. A win synthesizes an implicit call node.
    pub(crate) fn binaryop_try_operator_overload(
        &mut self,
        binop: NodeId,
        third_argument: Option<NodeId>,
    ) -> CheckResult<Resolution> {
        let (op, left, right, cached) = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => (def.op, def.left, def.right, def.overload_args.clone()),
            _ => return Ok(Resolution::NoMatch),
        };

        if !self.has_operator_overloads(op) {
            return Ok(Resolution::NoMatch);
        }

        let args = match cached {
            Some(args) => args,
            None => {
                let first = if op.is_assignment() {
                    // Assignment overloads receive the left side by
                    // reference. The address-of is checked speculatively;
                    // nothing it marks may stick.
                    let aof = self.ast.address_of(left);

                    let saved_final = self.all_checks_are_final;
                    let saved_level = self.checking_level;
                    self.all_checks_are_final = false;
                    let mark = self.sink.begin_probe();
                    let cs = self.check_address_of(aof);
                    self.sink.end_probe(mark, cs.is_ok());
                    self.checking_level = saved_level;
                    self.all_checks_are_final = saved_final;

                    match cs {
                        Ok(()) => {}
                        Err(Interrupt::Yield) => return Ok(Resolution::Yield),
                        Err(_) => return Ok(Resolution::NoMatch),
                    }
                    self.ast.argument(aof)
                } else {
                    self.ast.argument(left)
                };

                let second = self.ast.argument(right);
                let mut values = vec![Some(first), Some(second)];
                if let Some(third) = third_argument {
                    let third = self.ast.argument(third);
                    values.push(Some(third));
                }

                let args = CallArgs {
                    values,
                    named: Vec::new(),
                };
                if let NodeKind::Binary(def) = &mut self.ast.node_mut(binop).kind {
                    def.overload_args = Some(args.clone());
                }
                args
            }
        };

        let overloads = self.operator_overloads_for(op);
        match self.find_matching_overload_by_arguments(&overloads, &args)? {
            Resolution::Yield => Ok(Resolution::Yield),
            Resolution::NoMatch => Ok(Resolution::NoMatch),
            Resolution::Found(overload) => {
                let span = self.span_of(binop);
                let mut call = Node::new(NodeKind::Call(Box::new(CallDef {
                    callee: overload,
                    args,
                    va_kind: Some(VarArgKind::NotVA),
                    intrinsic: None,
                })));
                call.span = span;
                let call = self.ast.alloc(call);
                Ok(Resolution::Found(call))
            }
        }
    }

    pub(crate) fn check_binaryop(&mut self, binop: NodeId) -> CheckResult {
        if self.ast.node(binop).checked() {
            return Ok(());
        }
        let span = self.span_of(binop);

        let (op, left, right) = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => (def.op, def.left, def.right),
            _ => return Ok(()),
        };

        // `a[i] = v` with a Subscript_Equals overload in scope lowers to a
        // ternary overload call before anything else is considered.
        if op == BinaryOp::Assign
            && matches!(self.ast.node(left).kind, NodeKind::Subscript(_))
            && self.has_operator_overloads(BinaryOp::SubscriptEquals)
        {
            let substitute = match &self.ast.node(binop).kind {
                NodeKind::Binary(def) => def.potential_substitute,
                _ => None,
            };
            let substitute = match substitute {
                Some(s) => s,
                None => {
                    let (sub_addr, sub_index) = match &self.ast.node(left).kind {
                        NodeKind::Subscript(def) => (def.addr, def.index),
                        _ => unreachable!("matched subscript above"),
                    };

                    let saved_level = self.checking_level;
                    self.check_expression(sub_addr)?;
                    self.check_expression(sub_index)?;
                    self.check_expression(right)?;
                    self.checking_level = saved_level;

                    let s = self.ast.binary(BinaryOp::SubscriptEquals, sub_addr, sub_index);
                    self.ast.node_mut(s).span = span;
                    if let NodeKind::Binary(def) = &mut self.ast.node_mut(binop).kind {
                        def.potential_substitute = Some(s);
                    }
                    s
                }
            };

            match self.binaryop_try_operator_overload(substitute, Some(right))? {
                Resolution::Yield => {
                    return Err(self.yield_now(span, "a potential operator overload"))
                }
                Resolution::Found(call) => {
                    self.ast.replace_with_node(binop, call);
                    return self.check_call(binop);
                }
                Resolution::NoMatch => {}
            }
        }

        let saved_level = self.checking_level;
        self.check_expression(left)?;
        self.check_expression(right)?;
        self.checking_level = saved_level;

        // `.Name` on either side resolves against the other side's type.
        let left_ufa = matches!(self.ast.node(left).kind, NodeKind::UnaryFieldAccess { .. });
        let right_ufa = matches!(self.ast.node(right).kind, NodeKind::UnaryFieldAccess { .. });
        if left_ufa || right_ufa {
            let mut resolved = false;
            if let Some(rty) = self.ty_of(right) {
                resolved = self.unify(left, rty)?;
            }
            if !resolved {
                if let Some(lty) = self.ty_of(left) {
                    resolved = self.unify(right, lty)?;
                }
            }
            if !resolved {
                return Err(self.report_bad_binaryop(span, op, left, right));
            }
        }

        if self.is_comptime(left) && self.is_comptime(right) {
            self.add_flag(binop, NodeFlags::COMPTIME);
        }

        if self.expression_types_must_be_known
            && (self.ty_of(left).is_none() || self.ty_of(right).is_none())
        {
            return Err(self.error(
                span,
                CheckError::Message(
                    "Internal compiler error: one of the operand types is unknown here"
                        .to_string(),
                ),
            ));
        }

        // Operator overloading applies when either operand is non-basic or
        // SIMD.
        let wants_overload = |ty: Option<TypeId>, this: &Checker| {
            ty.is_some_and(|t| match this.types.get(t) {
                Type::Basic { flags, .. } => flags.contains(BasicFlags::SIMD),
                _ => true,
            })
        };
        if wants_overload(self.ty_of(left), self) || wants_overload(self.ty_of(right), self) {
            match self.binaryop_try_operator_overload(binop, None)? {
                Resolution::Yield => {
                    return Err(self.yield_now(span, "an operator overload to resolve"))
                }
                Resolution::Found(call) => {
                    self.ast.replace_with_node(binop, call);
                    return self.check_call(binop);
                }
                Resolution::NoMatch => {}
            }
        }

        if op.is_assignment() {
            return self.check_binaryop_assignment(binop);
        }

        for side in [left, right] {
            if self.ty_of(side).is_none()
                && self
                    .entity_state_of(side)
                    .is_some_and(|s| s <= crate::EntityState::CheckTypes)
            {
                let sspan = self.span_of(side);
                return Err(self.yield_now(sspan, "this type to be known"));
            }
        }

        if op.is_compare() {
            return self.check_binaryop_compare(binop);
        }
        if op == BinaryOp::BoolAnd || op == BinaryOp::BoolOr {
            return self.check_binaryop_bool(binop);
        }

        let Some(left_ty) = self.ty_of(left) else {
            return Err(self.yield_now(span, "the left operand's type"));
        };
        let Some(right_ty) = self.ty_of(right) else {
            return Err(self.yield_now(span, "the right operand's type"));
        };

        // The left side cannot be compound; the right side is always
        // numeric; the left side cannot be rawptr.
        if self.types.is_compound(left_ty) || !self.types.is_numeric(right_ty) {
            return Err(self.report_bad_binaryop(span, op, left, right));
        }
        if self.types.is_rawptr(left_ty) {
            return Err(self.error(span, CheckError::RawptrArithmetic));
        }

        // Pointer arithmetic scales the integer side by the element size.
        if let Some(elem) = self.types.pointer_elem(left_ty) {
            if op != BinaryOp::Add && op != BinaryOp::Sub {
                return Err(self.report_bad_binaryop(span, op, left, right));
            }

            self.resolve_expression_type(right);
            let right_ty = self.ty_of(right).expect("right operand resolved above");
            if !self.types.is_integer(right_ty) {
                return Err(self.report_bad_binaryop(span, op, left, right));
            }

            let elem_size = self.types.size_of(elem);
            let mut size_lit = Node::new(NodeKind::NumLit {
                value: NumValue::Int(elem_size as i64),
            });
            size_lit.span = self.span_of(right);
            size_lit.ty = Some(right_ty);
            size_lit.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
            let size_lit = self.ast.alloc(size_lit);

            let scaled = self.ast.binary(BinaryOp::Mul, right, size_lit);
            self.ast.node_mut(scaled).span = span;
            self.check_binaryop(scaled)?;

            if let NodeKind::Binary(def) = &mut self.ast.node_mut(binop).kind {
                def.right = scaled;
            }
            self.set_ty(scaled, left_ty);
            self.set_ty(binop, left_ty);
        }

        let (left_ty, right_ty) = (
            self.ty_of(left).expect("left operand typed"),
            self.ty_of(binary_right(self, binop)).expect("right operand typed"),
        );

        if !self.types.compatible(left_ty, right_ty) {
            let right = binary_right(self, binop);
            let left_ac = is_auto_cast(self, left);
            let right_ac = is_auto_cast(self, right);
            if left_ac && right_ac {
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "Cannot have auto cast on both sides of binary operator".to_string(),
                    ),
                ));
            }

            if !self.unify(left, right_ty)? && !self.unify(right, left_ty)? {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Mismatched types for binary operation '{}'. left: '{}', right: '{}'",
                        op.symbol(),
                        self.type_name_of(left),
                        self.type_name_of(right)
                    )),
                ));
            }
        }

        if self.ty_of(binop).is_none() {
            let ty = self.ty_of(left).expect("left operand typed");
            self.set_ty(binop, ty);
        }

        let result_ty = self.ty_of(binop).expect("result type just set");
        if !self.binary_op_is_allowed(op, result_ty) {
            let right = binary_right(self, binop);
            return Err(self.report_bad_binaryop(span, op, left, right));
        }

        // Testing a flags-enum with '&' produces a boolean.
        if let Type::Enum(en) = self.types.get(result_ty) {
            if en.is_flags && op == BinaryOp::And {
                let bool_ = self.types.basic.bool_;
                self.set_ty(binop, bool_);
            }
        }

        if self.all_checks_are_final {
            self.add_flag(binop, NodeFlags::HAS_BEEN_CHECKED);
            if self.is_comptime(binop) {
                self.reduce_expression(binop);
            }
        }

        Ok(())
    }

    /// The static operation × type-class allow-matrix.
    pub fn binary_op_is_allowed(&self, op: BinaryOp, ty: TypeId) -> bool {
        let required = match op {
            BinaryOp::Add | BinaryOp::Sub => BasicFlags::NUMERIC | BasicFlags::POINTER,
            BinaryOp::Mul | BinaryOp::Div => BasicFlags::NUMERIC,
            BinaryOp::Mod => BasicFlags::INTEGER,

            BinaryOp::Equal | BinaryOp::NotEqual => BasicFlags::EQUALITY,
            BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => BasicFlags::ORDERED,

            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::Sar => BasicFlags::INTEGER,

            BinaryOp::BoolAnd | BinaryOp::BoolOr => BasicFlags::BOOLEAN,

            _ => return false,
        };

        self.types
            .effective_flags(ty)
            .intersects(required)
    }

    pub(crate) fn check_binaryop_assignment(&mut self, binop: NodeId) -> CheckResult {
        let span = self.span_of(binop);
        let (op, left, right) = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => (def.op, def.left, def.right),
            _ => return Ok(()),
        };

        if self.checking_level == CheckingLevel::Expression {
            return Err(self.error(span, CheckError::AssignmentInExpression));
        }

        if !self.ast.node(self.strip_aliases(left)).is_lval() {
            let lspan = self.span_of(left);
            let name = self.ast.node(left).kind.name().to_string();
            return Err(self.error(lspan, CheckError::NotLValue(name)));
        }

        if self.has_flag(left, NodeFlags::CONST) && self.ty_of(left).is_some() {
            let name = self.ast.node(left).kind.name().to_string();
            return Err(self.error(span, CheckError::AssignToConstant(name)));
        }

        if op == BinaryOp::Assign {
            // Plain assignment infers an untyped left side from the right.
            if self.ty_of(left).is_none() {
                if self.ast.node(left).type_node.is_some()
                    && self
                        .entity_state_of(left)
                        .is_some_and(|s| s <= crate::EntityState::CheckTypes)
                {
                    return Err(
                        self.yield_now(span, "the left-hand side's type to be constructed")
                    );
                }

                self.resolve_expression_type(right);
                let Some(right_ty) = self.ty_of(right) else {
                    if !self
                        .entity_state_of(right)
                        .is_some_and(|s| s <= crate::EntityState::CheckTypes)
                    {
                        return Err(self.error(
                            span,
                            CheckError::Message(
                                "Could not resolve type of right hand side to infer".to_string(),
                            ),
                        ));
                    }
                    return Err(self.yield_now(span, "the right-hand side's type"));
                };

                if let Type::Compound { types } = self.types.get(right_ty) {
                    // Compound destructuring: each left expression takes
                    // the matching component type.
                    let component_types = types.clone();
                    let lhs_exprs = match &self.ast.node(left).kind {
                        NodeKind::Compound { exprs } => Some(exprs.clone()),
                        _ => None,
                    };
                    let Some(lhs_exprs) = lhs_exprs.filter(|e| e.len() == component_types.len())
                    else {
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "Expected left hand side to have {} expressions",
                                component_types.len()
                            )),
                        ));
                    };

                    for (lhs, ty) in lhs_exprs.iter().zip(component_types.iter()) {
                        self.set_ty(*lhs, *ty);
                    }
                    self.set_ty(left, right_ty);
                } else {
                    self.set_ty(left, right_ty);
                }
            }
        } else {
            // Compound assignment desugars to `left = left <op> right` and
            // rechecks.
            let base = op
                .compound_base()
                .expect("assignment family operator has a base operation");
            let new_right = self.ast.binary(base, left, right);
            self.ast.node_mut(new_right).span = span;

            if let NodeKind::Binary(def) = &mut self.ast.node_mut(binop).kind {
                def.op = BinaryOp::Assign;
                def.right = new_right;
            }
            self.check_binaryop(new_right)?;
        }

        let right = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => def.right,
            _ => right,
        };

        if self.ty_of(right).is_none()
            && self
                .entity_state_of(right)
                .is_some_and(|s| s <= crate::EntityState::CheckTypes)
        {
            return Err(self.yield_now(span, "the type of the right-hand side"));
        }

        let left_ty = self.ty_of(left).expect("left side typed or inferred above");
        if !self.unify(right, left_ty)? {
            return Err(self.error(
                span,
                CheckError::AssignMismatch {
                    expected: self.type_name_of(left),
                    found: self.type_name_of(right),
                },
            ));
        }

        let void = self.types.basic.void;
        self.set_ty(binop, void);
        Ok(())
    }

    pub(crate) fn check_binaryop_compare(&mut self, binop: NodeId) -> CheckResult {
        let span = self.span_of(binop);
        let (op, left, right) = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => (def.op, def.left, def.right),
            _ => return Ok(()),
        };

        let Some(mut ltype) = self.ty_of(left) else {
            return Err(self.yield_now(span, "the left type to be known"));
        };
        let Some(mut rtype) = self.ty_of(right) else {
            return Err(self.yield_now(span, "the right type to be known"));
        };

        // Pointers compare as rawptr: `^T` to rawptr is one-way, so both
        // sides are erased before the compatibility test.
        if self.types.pointer_elem(ltype).is_some() {
            ltype = self.types.basic.rawptr;
        }
        if self.types.pointer_elem(rtype).is_some() {
            rtype = self.types.basic.rawptr;
        }

        if !self.types.compatible(ltype, rtype) {
            let left_ac = is_auto_cast(self, left);
            let right_ac = is_auto_cast(self, right);
            if left_ac && right_ac {
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "Cannot have auto cast on both sides of binary operator".to_string(),
                    ),
                ));
            }

            if !self.unify(left, rtype)? && !self.unify(right, ltype)? {
                return Err(self.error(
                    span,
                    CheckError::BadComparison {
                        left: self.type_name_of(left),
                        right: self.type_name_of(right),
                    },
                ));
            }
        }

        let left_ty = self.ty_of(left).expect("left side typed");
        if !self.binary_op_is_allowed(op, left_ty) {
            return Err(self.report_bad_binaryop(span, op, left, right));
        }

        let bool_ = self.types.basic.bool_;
        self.set_ty(binop, bool_);
        if self.is_comptime(binop) {
            self.reduce_expression(binop);
        }

        Ok(())
    }

    pub(crate) fn check_binaryop_bool(&mut self, binop: NodeId) -> CheckResult {
        let span = self.span_of(binop);
        let (op, left, right) = match &self.ast.node(binop).kind {
            NodeKind::Binary(def) => (def.op, def.left, def.right),
            _ => return Ok(()),
        };

        let both_bool = self.ty_of(left).is_some_and(|t| self.types.is_bool(t))
            && self.ty_of(right).is_some_and(|t| self.types.is_bool(t));
        if !both_bool {
            return Err(self.report_bad_binaryop(span, op, left, right));
        }

        let bool_ = self.types.basic.bool_;
        self.set_ty(binop, bool_);
        if self.is_comptime(binop) {
            self.reduce_expression(binop);
        }
        Ok(())
    }

    pub(crate) fn check_unaryop(&mut self, unop: NodeId) -> CheckResult {
        let span = self.span_of(unop);
        let (op, expr) = match &self.ast.node(unop).kind {
            NodeKind::Unary { op, expr } => (*op, *expr),
            _ => return Ok(()),
        };

        self.check_expression(expr)?;

        if op != UnaryOp::Negate {
            self.resolve_expression_type(expr);
        }

        match op {
            UnaryOp::Cast => {
                let Some(target) = self.ty_of(unop) else {
                    return Err(self.yield_now(span, "the destination type of this cast"));
                };
                let Some(src) = self.ty_of(expr) else {
                    return Err(self.yield_now(span, "the type of the cast operand"));
                };
                if let Err(err) = self.cast_is_legal(src, target) {
                    return Err(self.error(span, err));
                }
            }
            UnaryOp::AutoCast => {
                // Committed by unification against the surrounding context.
            }
            _ => {
                if let Some(ty) = self.ty_of(expr) {
                    self.set_ty(unop, ty);
                }
            }
        }

        if op == UnaryOp::Not {
            let is_bool = self.ty_of(expr).is_some_and(|t| self.types.is_bool(t));
            if !is_bool {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Bool negation operator expected bool type, got '{}'",
                        self.type_name_of(expr)
                    )),
                ));
            }
        }

        if op == UnaryOp::BitwiseNot {
            let is_int = self.ty_of(expr).is_some_and(|t| self.types.is_integer(t));
            if !is_int {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Bitwise operator expected integer type, got '{}'",
                        self.type_name_of(expr)
                    )),
                ));
            }
        }

        if self.is_comptime(expr) {
            self.add_flag(unop, NodeFlags::COMPTIME);
            self.reduce_expression(unop);
        }

        Ok(())
    }
}

fn is_auto_cast(checker: &Checker, id: NodeId) -> bool {
    matches!(
        checker.ast.node(id).kind,
        NodeKind::Unary {
            op: UnaryOp::AutoCast,
            ..
        }
    )
}

fn binary_right(checker: &Checker, binop: NodeId) -> NodeId {
    match &checker.ast.node(binop).kind {
        NodeKind::Binary(def) => def.right,
        _ => unreachable!("caller holds a binary node"),
    }
}
