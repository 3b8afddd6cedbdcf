//! Expression checking.
//!
//! One dispatch over node kind; types flow up from the leaves unless the
//! surrounding context coerces through unification. Rewrites (operator
//! overloads, slices, type reification) replace the node in place so the
//! parent slot stays valid.

use tracing::trace;

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Resolution};
use crate::types::{StructStatus, Type};
use crate::{Checker, CheckingLevel};

impl Checker {
    pub(crate) fn check_expression(&mut self, expr: NodeId) -> CheckResult {
        if self.ast.node(expr).is_type_ast() {
            // A type expression in value position reifies to a type value.
            // The underlying type is constructed now so later stages never
            // see an unbuilt type; polymorphic structs cannot be built
            // ahead of their arguments.
            self.check_type(expr)?;
            if !matches!(self.ast.node(expr).kind, NodeKind::PolyStructDecl(_))
                && self.build_type_from_ast(expr).is_none()
            {
                let span = self.span_of(expr);
                return Err(self.yield_now(span, "constructing this type"));
            }
            let type_index = self.types.basic.type_index;
            self.set_ty(expr, type_index);
            return Ok(());
        }

        match self.ast.node(expr).kind {
            // Polymorphic procedures and macros are checked when they are
            // instantiated, not where they are referenced.
            NodeKind::PolyProc(_) | NodeKind::Macro(_) => return Ok(()),
            NodeKind::DirectiveInit(_) => {
                let span = self.span_of(expr);
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "#init is not allowed in normal expressions".to_string(),
                    ),
                ));
            }
            _ => {}
        }

        self.fill_in_type(expr)?;
        self.checking_level = CheckingLevel::Expression;

        match &self.ast.node(expr).kind {
            NodeKind::Binary(_) => self.check_binaryop(expr),
            NodeKind::Unary { .. } => self.check_unaryop(expr),
            NodeKind::Call(_) => self.check_call(expr),
            NodeKind::Argument { .. } => self.check_argument(expr),
            NodeKind::Block(_) => self.check_block(expr),

            NodeKind::Symbol { name } => {
                let name = name.clone();
                let span = self.span_of(expr);
                Err(self.yield_now(span, &format!("resolution of symbol '{name}'")))
            }

            NodeKind::Param { .. } => {
                if self.ty_of(expr).is_none() {
                    let span = self.span_of(expr);
                    return Err(self.yield_now(span, "parameter type"));
                }
                Ok(())
            }
            NodeKind::Local { .. } => Ok(()),

            NodeKind::AddressOf { .. } => self.check_address_of(expr),
            NodeKind::Dereference { .. } => self.check_dereference(expr),
            NodeKind::Subscript(_) | NodeKind::Slice { .. } => self.check_subscript(expr),
            NodeKind::FieldAccess(_) => self.check_field_access(expr),
            NodeKind::MethodCall { .. } => self.check_method_call(expr),
            NodeKind::SizeOf { .. } => self.check_size_of(expr),
            NodeKind::AlignOf { .. } => self.check_align_of(expr),
            NodeKind::RangeLiteral { .. } => self.check_range_literal(expr),

            NodeKind::Global { .. } => {
                if self.ty_of(expr).is_none() {
                    let span = self.span_of(expr);
                    return Err(self.error(
                        span,
                        CheckError::Message("Global with unknown type".to_string()),
                    ));
                }
                Ok(())
            }

            NodeKind::NumLit { value } => {
                if self.ty_of(expr).is_none() {
                    let ty = match value {
                        NumValue::Int(_) => self.types.basic.int_unsized,
                        NumValue::Float(_) => self.types.basic.float_unsized,
                        NumValue::Bool(_) => self.types.basic.bool_,
                    };
                    self.set_ty(expr, ty);
                }
                self.add_flag(expr, NodeFlags::COMPTIME);
                Ok(())
            }
            NodeKind::StrLit { .. } => {
                if self.ty_of(expr).is_none() {
                    let str_ = self.types.basic.str_;
                    self.set_ty(expr, str_);
                }
                self.add_flag(expr, NodeFlags::COMPTIME);
                Ok(())
            }

            NodeKind::StructLiteral(_) => self.check_struct_literal(expr),
            NodeKind::ArrayLiteral { .. } => self.check_array_literal(expr),

            NodeKind::Function(_) => {
                if self.ty_of(expr).is_none() {
                    let span = self.span_of(expr);
                    return Err(self.yield_now(span, "this function's type"));
                }
                self.add_flag(expr, NodeFlags::FUNCTION_USED);
                Ok(())
            }

            NodeKind::DirectiveSolidify(_) => self.check_directive_solidify(expr),
            NodeKind::DirectiveDefined { is_defined } => {
                let is_defined = *is_defined;
                let span = self.span_of(expr);
                let bool_ = self.types.basic.bool_;
                let mut lit = Node::new(NodeKind::NumLit {
                    value: NumValue::Bool(is_defined),
                });
                lit.span = span;
                lit.ty = Some(bool_);
                lit.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
                self.ast.replace(expr, lit);
                Ok(())
            }

            NodeKind::Compound { .. } => self.check_compound(expr),

            NodeKind::CallSite(_) => {
                let callsite = self.builtins.callsite_type;
                self.set_ty(expr, callsite);
                Ok(())
            }

            NodeKind::IfExpression { .. } => self.check_if_expression(expr),

            NodeKind::Alias { of } => {
                let of = *of;
                self.check_expression(of)?;
                if self.is_comptime(of) {
                    self.add_flag(expr, NodeFlags::COMPTIME);
                }
                if let Some(ty) = self.ty_of(of) {
                    self.set_ty(expr, ty);
                }
                Ok(())
            }

            NodeKind::DirectiveInsert { .. } => self.check_insert_directive(expr),

            NodeKind::CodeBlock { .. } => {
                self.add_flag(expr, NodeFlags::COMPTIME);
                let code = self.types.basic.code;
                self.set_ty(expr, code);
                Ok(())
            }

            NodeKind::DoBlock { .. } => self.check_do_block(expr),

            NodeKind::Memres(_) => {
                if self.ty_of(expr).is_none() {
                    let span = self.span_of(expr);
                    return Err(self.yield_now(span, "this global's type"));
                }
                Ok(())
            }

            NodeKind::FileContents { .. }
            | NodeKind::OverloadedFunction(_)
            | NodeKind::EnumValue { .. }
            | NodeKind::Package { .. }
            | NodeKind::Error
            | NodeKind::UnaryFieldAccess { .. }
            | NodeKind::ConstraintSentinel
            | NodeKind::SwitchCase(_)
            | NodeKind::ZeroValue => Ok(()),

            _ => {
                let span = self.span_of(expr);
                Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "unexpected {} in expression position",
                        self.ast.node(expr).kind.name()
                    )),
                ))
            }
        }
    }

    pub(crate) fn check_type_opt(&mut self, ty: Option<NodeId>) -> CheckResult {
        match ty {
            Some(id) => self.check_type(id),
            None => Ok(()),
        }
    }

    /// Check a type AST node: its embedded expressions are checked, element
    /// types recurse, and the node is marked comptime + checked.
    pub(crate) fn check_type(&mut self, id: NodeId) -> CheckResult {
        // Walk through alias chains to the underlying type expression.
        let mut t = id;
        while let NodeKind::TypeAlias { to } = &self.ast.node(t).kind {
            t = *to;
        }

        if self.ast.node(t).checked() {
            return Ok(());
        }

        let no_error = self.ast.node(t).flags & NodeFlags::HEADER_CHECK_NO_ERROR;

        match self.ast.node(t).kind.clone() {
            NodeKind::PolyCallType { params, .. } => {
                for param in params {
                    if !self.ast.node(param).is_type_ast() {
                        self.check_expression(param)?;
                        self.resolve_expression_type(param);
                        self.fill_in_type(param)?;
                    }
                }
            }

            NodeKind::TypeOf { expr, .. } => {
                self.check_expression(expr)?;
                self.resolve_expression_type(expr);
                let Some(ty) = self.ty_of(expr) else {
                    let span = self.span_of(t);
                    return Err(self.yield_now(span, "the type of this type-of expression"));
                };
                if let NodeKind::TypeOf { resolved, .. } = &mut self.ast.node_mut(t).kind {
                    *resolved = Some(ty);
                }
            }

            NodeKind::PointerType { elem }
            | NodeKind::SliceType { elem }
            | NodeKind::DynArrType { elem }
            | NodeKind::VarArgType { elem } => {
                self.ast.node_mut(elem).flags |= no_error;
                self.check_type(elem)?;
            }

            NodeKind::FunctionType { params, ret } => {
                self.check_type(ret)?;
                for p in params {
                    self.check_type(p)?;
                }
            }

            NodeKind::CompoundType { types } => {
                for ty in types {
                    self.check_type(ty)?;
                }
            }

            NodeKind::ArrayType { count_expr, .. } => {
                if let Some(count) = count_expr {
                    self.check_expression(count)?;
                    self.resolve_expression_type(count);
                }
            }

            NodeKind::FieldAccess(_) => {
                self.check_field_access(t)?;
                if !self.ast.node(t).is_type_ast() {
                    let span = self.span_of(t);
                    let kind = self.ast.node(t).kind.name();
                    return Err(self.error(
                        span,
                        CheckError::Message(format!(
                            "This field access did not resolve to be a type. It resolved to be a '{kind}'",
                        )),
                    ));
                }
            }

            _ => {}
        }

        // Mark the whole alias chain comptime, and the underlying node
        // checked.
        let mut walk = id;
        self.add_flag(walk, NodeFlags::COMPTIME);
        while let NodeKind::TypeAlias { to } = &self.ast.node(walk).kind {
            walk = *to;
            self.add_flag(walk, NodeFlags::COMPTIME);
        }
        self.add_flag(t, NodeFlags::HAS_BEEN_CHECKED);
        Ok(())
    }

    pub(crate) fn check_struct_literal(&mut self, sl: NodeId) -> CheckResult {
        let span = self.span_of(sl);

        if self.ty_of(sl).is_none() {
            let stnode = match &self.ast.node(sl).kind {
                NodeKind::StructLiteral(def) => def.stnode,
                _ => None,
            };

            // No type, no type expression: the literal's type is inferred
            // from wherever it ends up being used. Defer.
            let Some(stnode) = stnode else {
                let args = match &self.ast.node(sl).kind {
                    NodeKind::StructLiteral(def) => def.args.clone(),
                    _ => CallArgs::default(),
                };
                self.check_arguments(&args)?;
                return Ok(());
            };

            self.check_expression(stnode)?;
            if !self.ast.node(stnode).is_type_ast() {
                return Err(self.error(
                    span,
                    CheckError::Message("Type used for struct literal is not a type".to_string()),
                ));
            }

            let Some(ty) = self.build_type_from_ast(stnode) else {
                return Err(self.yield_now(span, "the type of this struct literal"));
            };
            self.set_ty(sl, ty);
        }

        let ty = self.ty_of(sl).expect("struct literal type was just set");

        if !self.types.is_structlike_strict(ty) {
            // With no arguments, any type can be zero-constructed.
            let empty = match &self.ast.node(sl).kind {
                NodeKind::StructLiteral(def) => {
                    def.args.values.is_empty() && def.args.named.is_empty()
                }
                _ => false,
            };
            if empty {
                let zv = self.ast.zero_value(span, ty);
                if let NodeKind::StructLiteral(def) = &mut self.ast.node_mut(sl).kind {
                    def.args.values.push(Some(zv));
                }
                self.add_flag(sl, NodeFlags::HAS_BEEN_CHECKED | NodeFlags::COMPTIME);
                return Ok(());
            }

            if self.ast.node(sl).checked() {
                return Ok(());
            }

            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "'{}' is not constructable using a struct literal",
                    self.types.name(ty)
                )),
            ));
        }

        if let Some(st) = self.types.struct_type(ty) {
            if st.status != StructStatus::UsesDone {
                return Err(self.yield_now(span, "the struct type to be completed"));
            }
        }

        let mem_count = self.types.member_count(ty);
        if let NodeKind::StructLiteral(def) = &mut self.ast.node_mut(sl).kind {
            def.args.ensure_length(mem_count);
        }

        if !self.ast.node(sl).checked() {
            self.fill_in_struct_arguments(sl, ty, mem_count)?;
        }
        self.add_flag(sl, NodeFlags::HAS_BEEN_CHECKED);

        self.add_flag(sl, NodeFlags::COMPTIME);
        for i in 0..mem_count {
            let member = self
                .types
                .member_by_idx(ty, i)
                .expect("member index bounded by member count");
            let actual = match &self.ast.node(sl).kind {
                NodeKind::StructLiteral(def) => def.args.values[i],
                _ => None,
            };
            let actual = actual.expect("argument filling left no holes");

            self.check_expression(actual)?;
            if self.ty_of(actual).is_none()
                && self
                    .entity_state_of(actual)
                    .is_some_and(|s| s <= crate::EntityState::CheckTypes)
            {
                let aspan = self.span_of(actual);
                return Err(self.yield_now(aspan, "the type of this member expression"));
            }

            if !self.unify(actual, member.ty)? {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Mismatched types for member '{}', expected '{}', got '{}'",
                        member.name,
                        self.types.name(member.ty),
                        self.type_name_of(actual)
                    )),
                ));
            }

            if !self.is_comptime(actual) {
                self.ast.node_mut(sl).flags.remove(NodeFlags::COMPTIME);
            }
        }

        Ok(())
    }

    /// Slot named arguments and member defaults into the positional list;
    /// every member must end up with a value.
    fn fill_in_struct_arguments(
        &mut self,
        sl: NodeId,
        ty: TypeId,
        mem_count: usize,
    ) -> CheckResult {
        let named = match &self.ast.node(sl).kind {
            NodeKind::StructLiteral(def) => def.args.named.clone(),
            _ => Vec::new(),
        };

        for nv in named {
            let Some(member) = self.types.lookup_member(ty, &nv.name) else {
                let span = self.span_of(sl);
                return Err(self.error(
                    span,
                    CheckError::UndefinedField {
                        field: nv.name.clone(),
                        ty: self.types.name(ty),
                        suggestion: None,
                    },
                ));
            };
            if member.idx < mem_count {
                if let NodeKind::StructLiteral(def) = &mut self.ast.node_mut(sl).kind {
                    if def.args.values[member.idx].is_none() {
                        def.args.values[member.idx] = Some(nv.value);
                    }
                }
            }
        }

        let mut missing = Vec::new();
        for i in 0..mem_count {
            let filled = match &self.ast.node(sl).kind {
                NodeKind::StructLiteral(def) => def.args.values[i].is_some(),
                _ => true,
            };
            if filled {
                continue;
            }

            let member = self
                .types
                .member_by_idx(ty, i)
                .expect("member index bounded by member count");
            if let Some(default) = member.initial_value {
                let value = self.ast.clone_subtree(default);
                if let NodeKind::StructLiteral(def) = &mut self.ast.node_mut(sl).kind {
                    def.args.values[i] = Some(value);
                }
            } else {
                missing.push((i, member.name.clone()));
            }
        }

        if !missing.is_empty() {
            let span = self.span_of(sl);
            let ty_name = self.types.name(ty);
            for (i, name) in missing {
                self.sink.error(
                    span,
                    CheckError::Message(format!(
                        "Value not given for member {} ('{}') of type '{}'",
                        i + 1,
                        name,
                        ty_name
                    )),
                );
            }
            return Err(crate::Interrupt::Error);
        }

        Ok(())
    }

    pub(crate) fn check_array_literal(&mut self, al: NodeId) -> CheckResult {
        let span = self.span_of(al);

        if !self.has_flag(al, NodeFlags::ARRAY_LITERAL_TYPED) {
            let (atnode, value_count) = match &self.ast.node(al).kind {
                NodeKind::ArrayLiteral { atnode, values } => (*atnode, values.len()),
                _ => (None, 0),
            };

            // Untyped array literals wait for context to give them a type.
            let Some(atnode) = atnode else {
                return Ok(());
            };

            self.check_expression(atnode)?;
            if !self.ast.node(atnode).is_type_ast() {
                return Err(self.error(
                    span,
                    CheckError::Message("Array type is not a type".to_string()),
                ));
            }

            let Some(elem) = self.build_type_from_ast(atnode) else {
                return Err(self.yield_now(span, "the element type of this array literal"));
            };

            let ty = self.types.array_of(elem, value_count as u32);
            self.set_ty(al, ty);
            self.add_flag(al, NodeFlags::ARRAY_LITERAL_TYPED);
        }

        let ty = self.ty_of(al).expect("typed array literal has a type");
        let (elem, count) = match self.types.get(ty) {
            Type::Array { elem, count } => (*elem, *count),
            _ => {
                return Err(self.error(
                    span,
                    CheckError::Message("Expected array type for array literal".to_string()),
                ))
            }
        };

        let values = match &self.ast.node(al).kind {
            NodeKind::ArrayLiteral { values, .. } => values.clone(),
            _ => Vec::new(),
        };

        if count as usize != values.len() {
            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "Wrong array size ({}) for number of values ({})",
                    count,
                    values.len()
                )),
            ));
        }

        self.add_flag(al, NodeFlags::COMPTIME);
        for value in values {
            self.check_expression(value)?;

            if self.ty_of(value).is_none()
                && self
                    .entity_state_of(value)
                    .is_some_and(|s| s <= crate::EntityState::CheckTypes)
            {
                return Err(self.yield_now(span, "the type of this array element"));
            }

            if !self.is_comptime(value) {
                self.ast.node_mut(al).flags.remove(NodeFlags::COMPTIME);
            }

            if !self.unify(value, elem)? {
                let vspan = self.span_of(value);
                return Err(self.error(
                    vspan,
                    CheckError::Mismatch {
                        expected: self.types.name(elem),
                        found: self.type_name_of(value),
                    },
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn check_range_literal(&mut self, range: NodeId) -> CheckResult {
        if self.ast.node(range).checked() {
            return Ok(());
        }
        let span = self.span_of(range);

        let (low, high, step) = match &self.ast.node(range).kind {
            NodeKind::RangeLiteral { low, high, step } => (*low, *high, *step),
            _ => return Ok(()),
        };

        self.check_expression(low)?;
        self.check_expression(high)?;

        let range_type = self.builtins.range_type;
        let low_ty = self
            .types
            .lookup_member(range_type, "low")
            .expect("builtin range type has a 'low' member");
        if !self.unify(low, low_ty.ty)? {
            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "Expected left side of range to be a 32-bit integer, got '{}'",
                    self.type_name_of(low)
                )),
            ));
        }

        let high_ty = self
            .types
            .lookup_member(range_type, "high")
            .expect("builtin range type has a 'high' member");
        if !self.unify(high, high_ty.ty)? {
            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "Expected right side of range to be a 32-bit integer, got '{}'",
                    self.type_name_of(high)
                )),
            ));
        }

        if step.is_none() {
            let step_member = self
                .types
                .lookup_member(range_type, "step")
                .expect("builtin range type has a 'step' member");
            let default = step_member
                .initial_value
                .expect("builtin range 'step' member is defaulted");
            self.check_expression(default)?;
            if let NodeKind::RangeLiteral { step, .. } = &mut self.ast.node_mut(range).kind {
                *step = Some(default);
            }
        }

        self.set_ty(range, range_type);
        self.add_flag(range, NodeFlags::HAS_BEEN_CHECKED);
        Ok(())
    }

    pub(crate) fn check_compound(&mut self, compound: NodeId) -> CheckResult {
        let exprs = match &self.ast.node(compound).kind {
            NodeKind::Compound { exprs } => exprs.clone(),
            _ => Vec::new(),
        };
        for e in &exprs {
            self.check_expression(*e)?;
        }

        if self.resolve_expression_type(compound).is_none() {
            let span = self.span_of(compound);
            return Err(self.yield_now(span, "the types of this compound expression"));
        }
        Ok(())
    }

    pub(crate) fn check_if_expression(&mut self, if_expr: NodeId) -> CheckResult {
        let (cond, true_expr, false_expr) = match &self.ast.node(if_expr).kind {
            NodeKind::IfExpression { cond, true_expr, false_expr } => {
                (*cond, *true_expr, *false_expr)
            }
            _ => return Ok(()),
        };
        let span = self.span_of(if_expr);

        self.check_expression(cond)?;
        self.check_expression(true_expr)?;
        self.check_expression(false_expr)?;

        let bool_ = self.types.basic.bool_;
        if !self.unify(cond, bool_)? {
            return Err(self.error(
                span,
                CheckError::ConditionNotBool {
                    found: self.type_name_of(cond),
                },
            ));
        }

        let Some(true_ty) = self.resolve_expression_type(true_expr) else {
            return Err(self.yield_now(span, "the type of the true branch"));
        };
        let Some(false_ty) = self.resolve_expression_type(false_expr) else {
            return Err(self.yield_now(span, "the type of the false branch"));
        };

        if !self.types.compatible(true_ty, false_ty) {
            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "Mismatched types for if-expression, left side is '{}', and right side is '{}'",
                    self.types.name(true_ty),
                    self.types.name(false_ty)
                )),
            ));
        }

        self.set_ty(if_expr, true_ty);
        Ok(())
    }

    pub(crate) fn check_do_block(&mut self, doblock: NodeId) -> CheckResult {
        if self.ast.node(doblock).checked() {
            return Ok(());
        }

        let block = match &self.ast.node(doblock).kind {
            NodeKind::DoBlock { block } => *block,
            _ => return Ok(()),
        };

        self.fill_in_type(doblock)?;
        if self.ty_of(doblock).is_none() {
            let auto = self.types.basic.auto_return;
            self.set_ty(doblock, auto);
        }

        let old_expected_return = self.expected_return;
        self.expected_return = Some(crate::ReturnSlot::Node(doblock));

        if let NodeKind::Block(def) = &mut self.ast.node_mut(block).kind {
            def.rules = BlockRule::DoBlock;
        }

        let result = self.check_block(block);
        self.expected_return = old_expected_return;
        result?;

        if self.ty_of(doblock) == Some(self.types.basic.auto_return) {
            let void = self.types.basic.void;
            self.set_ty(doblock, void);
        }

        self.add_flag(doblock, NodeFlags::HAS_BEEN_CHECKED);
        Ok(())
    }

    pub(crate) fn check_address_of(&mut self, aof: NodeId) -> CheckResult {
        let span = self.span_of(aof);
        let (expr, can_be_removed, substitute) = match &self.ast.node(aof).kind {
            NodeKind::AddressOf { expr, can_be_removed, potential_substitute } => {
                (*expr, *can_be_removed, *potential_substitute)
            }
            _ => return Ok(()),
        };

        // `^x[i]` tries the pointer-subscript operator overload first.
        let stripped = self.strip_aliases(expr);
        if matches!(self.ast.node(stripped).kind, NodeKind::Subscript(_))
            && self.has_operator_overloads(BinaryOp::PtrSubscript)
        {
            let substitute = match substitute {
                Some(s) => s,
                None => {
                    let (addr, index) = match &self.ast.node(stripped).kind {
                        NodeKind::Subscript(def) => (def.addr, def.index),
                        _ => unreachable!("matched subscript above"),
                    };
                    self.check_expression(addr)?;
                    self.check_expression(index)?;

                    let op = self.ast.binary(BinaryOp::PtrSubscript, addr, index);
                    self.ast.node_mut(op).span = span;
                    if let NodeKind::AddressOf { potential_substitute, .. } =
                        &mut self.ast.node_mut(aof).kind
                    {
                        *potential_substitute = Some(op);
                    }
                    op
                }
            };

            match self.binaryop_try_operator_overload(substitute, None)? {
                Resolution::Yield => {
                    return Err(self.yield_now(span, "a pointer-subscript operator overload"))
                }
                Resolution::Found(call) => {
                    self.ast.replace_with_node(aof, call);
                    return self.check_call(aof);
                }
                Resolution::NoMatch => {}
            }
        }

        self.check_expression(expr)?;
        if self.ast.node(expr).is_addressable_literal() {
            self.resolve_expression_type(expr);
        }

        if self.ty_of(expr).is_none() {
            return Err(self.yield_now(span, "the type of the expression to take a reference of"));
        }

        let stripped = self.strip_aliases(expr);

        // `^T` where T is a type produces the pointer type.
        if self.ast.node(stripped).is_type_ast() {
            let mut pt = Node::new(NodeKind::PointerType { elem: stripped });
            pt.span = span;
            self.ast.replace(aof, pt);
            self.check_type(aof)?;
            let type_index = self.types.basic.type_index;
            self.set_ty(aof, type_index);
            return Ok(());
        }

        let addressable = matches!(
            self.ast.node(stripped).kind,
            NodeKind::Subscript(_)
                | NodeKind::Dereference { .. }
                | NodeKind::FieldAccess(_)
                | NodeKind::Memres(_)
                | NodeKind::Local { .. }
                | NodeKind::ConstraintSentinel
        ) || self.ast.node(stripped).is_addressable_literal();

        if !addressable || self.has_flag(stripped, NodeFlags::CANNOT_TAKE_ADDR) {
            if can_be_removed {
                // The implicit `^` inserted for a method call can be elided
                // when the receiver is not an l-value; ask the scheduler to
                // retry with the plain value.
                self.ast.replace_with_node(aof, expr);
                return Err(crate::Interrupt::Yield);
            }

            return Err(self.error(
                span,
                CheckError::NotAddressable(self.ast.node(stripped).kind.name()),
            ));
        }

        self.add_flag(stripped, NodeFlags::ADDRESS_TAKEN);

        let expr_ty = self.ty_of(expr).expect("checked above");
        let ptr = self.types.pointer_to(expr_ty);
        self.set_ty(aof, ptr);
        Ok(())
    }

    pub(crate) fn check_dereference(&mut self, deref: NodeId) -> CheckResult {
        let expr = match &self.ast.node(deref).kind {
            NodeKind::Dereference { expr } => *expr,
            _ => return Ok(()),
        };
        let span = self.span_of(deref);

        self.check_expression(expr)?;

        let Some(ty) = self.ty_of(expr) else {
            return Err(self.yield_now(span, "the type of the dereferenced expression"));
        };

        if self.types.is_rawptr(ty) {
            return Err(self.error(span, CheckError::DerefRawptr));
        }
        let Some(elem) = self.types.pointer_elem(ty) else {
            return Err(self.error(span, CheckError::DerefNonPointer));
        };

        self.set_ty(deref, elem);
        Ok(())
    }

    pub(crate) fn check_subscript(&mut self, sub: NodeId) -> CheckResult {
        let span = self.span_of(sub);
        let (addr, index) = match &self.ast.node(sub).kind {
            NodeKind::Subscript(def) => (def.addr, def.index),
            NodeKind::Slice { addr, range, .. } => (*addr, *range),
            _ => return Ok(()),
        };

        self.check_expression(addr)?;
        self.check_expression(index)?;

        let Some(addr_ty) = self.ty_of(addr) else {
            return Err(self.yield_now(span, "the type of the left-hand side of this subscript"));
        };

        // Operator overloading comes before everything else.
        if matches!(self.ast.node(sub).kind, NodeKind::Subscript(_)) {
            if let Some(index_ty) = self.ty_of(index) {
                let non_basic = !matches!(self.types.get(addr_ty), Type::Basic { .. })
                    || !matches!(self.types.get(index_ty), Type::Basic { .. });
                if non_basic && self.has_operator_overloads(BinaryOp::Subscript) {
                    let substitute = match &self.ast.node(sub).kind {
                        NodeKind::Subscript(def) => def.overload_substitute,
                        _ => None,
                    };
                    let substitute = match substitute {
                        Some(s) => s,
                        None => {
                            let op = self.ast.binary(BinaryOp::Subscript, addr, index);
                            self.ast.node_mut(op).span = span;
                            if let NodeKind::Subscript(def) = &mut self.ast.node_mut(sub).kind {
                                def.overload_substitute = Some(op);
                            }
                            op
                        }
                    };

                    match self.binaryop_try_operator_overload(substitute, None)? {
                        Resolution::Yield => {
                            return Err(self.yield_now(span, "a subscript operator overload"))
                        }
                        Resolution::Found(call) => {
                            self.ast.replace_with_node(sub, call);
                            return self.check_call(sub);
                        }
                        Resolution::NoMatch => {}
                    }
                }
            }
        }

        if !self.types.is_array_accessible(addr_ty) {
            return Err(self.report_bad_binaryop(span, BinaryOp::Subscript, addr, index));
        }

        // Slice-like bases lower to their `data` pointer.
        let addr = if matches!(
            self.types.get(addr_ty),
            Type::Slice { .. } | Type::DynArray { .. } | Type::VarArgs { .. }
        ) {
            let data = self
                .types
                .lookup_member(addr_ty, "data")
                .expect("slice-like types expose a 'data' member");
            let mut fa = Node::new(NodeKind::FieldAccess(Box::new(FieldAccessDef {
                expr: addr,
                field: "data".to_string(),
                offset: Some(data.offset),
                idx: Some(data.idx),
            })));
            fa.span = self.span_of(addr);
            fa.ty = Some(data.ty);
            fa.flags |= NodeFlags::HAS_BEEN_CHECKED;
            let fa = self.ast.alloc(fa);
            match &mut self.ast.node_mut(sub).kind {
                NodeKind::Subscript(def) => def.addr = fa,
                NodeKind::Slice { addr, .. } => *addr = fa,
                _ => {}
            }
            fa
        } else {
            addr
        };

        let addr_ty = self.ty_of(addr).expect("subscript base is typed");

        // A range index produces a slice.
        let index_ty = self.ty_of(index);
        if index_ty.is_some_and(|t| self.types.compatible(t, self.builtins.range_type)) {
            let Some(of) = self.types.contained(addr_ty) else {
                return Err(self.error(
                    span,
                    CheckError::Message("Invalid type for left of slice creation".to_string()),
                ));
            };

            let elem_size = self.types.size_of(of);
            let slice_ty = self.types.slice_of(of);
            let mut node = Node::new(NodeKind::Slice {
                addr,
                range: index,
                elem_size: Some(elem_size),
            });
            node.span = span;
            node.ty = Some(slice_ty);
            self.ast.replace(sub, node);
            return Ok(());
        }

        self.resolve_expression_type(index);
        let index_typed_small = self
            .ty_of(index)
            .is_some_and(|t| self.types.is_small_integer(t));
        if !index_typed_small {
            self.sink.error(
                span,
                CheckError::Message(format!(
                    "Expected small integer type for index, got '{}'",
                    self.type_name_of(index)
                )),
            );
            return Err(crate::Interrupt::Error);
        }

        let Some(elem) = self.types.contained(addr_ty) else {
            return Err(self.error(
                span,
                CheckError::Message("Invalid type for left of array access".to_string()),
            ));
        };

        let elem_size = self.types.size_of(elem);
        self.set_ty(sub, elem);
        if let NodeKind::Subscript(def) = &mut self.ast.node_mut(sub).kind {
            def.elem_size = Some(elem_size);
        }
        Ok(())
    }

    pub(crate) fn check_field_access(&mut self, field_id: NodeId) -> CheckResult {
        if self.ast.node(field_id).checked() {
            return Ok(());
        }
        let span = self.span_of(field_id);

        let (expr, field) = match &self.ast.node(field_id).kind {
            NodeKind::FieldAccess(def) => (def.expr, def.field.clone()),
            _ => return Ok(()),
        };

        self.check_expression(expr)?;
        let Some(expr_ty) = self.ty_of(expr) else {
            return Err(self.yield_now(span, "the type of the source expression"));
        };

        if !self.types.is_structlike(expr_ty) {
            // `.count` on a sized array folds to a literal.
            if let Type::Array { count, .. } = self.types.get(expr_ty) {
                if field == "count" {
                    let count = *count;
                    let u32_ = self.types.basic.u32_;
                    let mut lit = Node::new(NodeKind::NumLit {
                        value: NumValue::Int(count as i64),
                    });
                    lit.span = span;
                    lit.ty = Some(u32_);
                    lit.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
                    self.ast.replace(field_id, lit);
                    return Ok(());
                }
            }

            return Err(self.error(
                span,
                CheckError::FieldOnNonStruct {
                    field,
                    ty: self.types.name(expr_ty),
                },
            ));
        }

        // `(*foo).member` reads through the dereference directly.
        let expr = match &self.ast.node(expr).kind {
            NodeKind::Dereference { expr: inner } => {
                let inner = *inner;
                if let NodeKind::FieldAccess(def) = &mut self.ast.node_mut(field_id).kind {
                    def.expr = inner;
                }
                inner
            }
            _ => expr,
        };
        let expr_ty = self.ty_of(expr).expect("field base is typed");

        let bare = match self.types.get(expr_ty) {
            Type::Pointer { elem } => *elem,
            _ => expr_ty,
        };
        if let Some(st) = self.types.struct_type(bare) {
            if st.status != StructStatus::UsesDone {
                return Err(self.yield_now(span, "the struct type to finish its use expansion"));
            }
        }

        let Some(member) = self.types.lookup_member(expr_ty, &field) else {
            // Fall back to the type's symbol scope (methods, constants).
            let scope = self.types.struct_type(bare).and_then(|s| s.scope);
            if let Some(scope) = scope {
                if let Some(n) = self.scopes.resolve_local(scope, &field) {
                    let mut alias = Node::new(NodeKind::Alias { of: n });
                    alias.span = span;
                    self.ast.replace(field_id, alias);
                    return self.check_expression(field_id);
                }
            }

            let candidates: Vec<String> = self
                .types
                .struct_type(bare)
                .map(|s| s.members.iter().map(|m| m.name.clone()).collect())
                .unwrap_or_default();
            let suggestion =
                crate::find_similar_name(&field, candidates.iter().map(|s| s.as_str()))
                    .or_else(|| scope.and_then(|s| self.scopes.closest_symbol(s, &field)));

            return Err(self.error(
                span,
                CheckError::UndefinedField {
                    field,
                    ty: self.types.name(expr_ty),
                    suggestion,
                },
            ));
        };

        // Members reached through `use x: ^T` need an intermediate access
        // through the pointer member.
        if let Some(through) = member.use_through_pointer_index {
            let containing = self
                .types
                .member_by_idx(bare, through)
                .expect("use-through index refers to an existing member");

            let mut access = Node::new(NodeKind::FieldAccess(Box::new(FieldAccessDef {
                expr,
                field: containing.name.clone(),
                offset: Some(containing.offset),
                idx: Some(containing.idx),
            })));
            access.span = span;
            access.ty = Some(containing.ty);
            access.flags |= NodeFlags::HAS_BEEN_CHECKED;
            let access = self.ast.alloc(access);

            if let NodeKind::FieldAccess(def) = &mut self.ast.node_mut(field_id).kind {
                def.expr = access;
            }
        }

        if let NodeKind::FieldAccess(def) = &mut self.ast.node_mut(field_id).kind {
            def.offset = Some(member.offset);
            def.idx = Some(member.idx);
        }
        self.set_ty(field_id, member.ty);
        self.add_flag(field_id, NodeFlags::HAS_BEEN_CHECKED);
        Ok(())
    }

    pub(crate) fn check_method_call(&mut self, mcall: NodeId) -> CheckResult {
        let (left, call) = match &self.ast.node(mcall).kind {
            NodeKind::MethodCall { left, call } => (*left, *call),
            _ => return Ok(()),
        };
        let span = self.span_of(mcall);

        self.check_expression(left)?;
        let Some(left_ty) = self.ty_of(left) else {
            return Err(self.yield_now(span, "the type of the method receiver"));
        };

        // The receiver becomes the first argument: by address unless it is
        // already a pointer. The synthesized `^` may be elided later if the
        // receiver turns out not to be addressable.
        let implicit = if self.types.pointer_elem(left_ty).is_none() {
            let aof = self.ast.address_of(left);
            if let NodeKind::AddressOf { can_be_removed, .. } = &mut self.ast.node_mut(aof).kind {
                *can_be_removed = true;
            }
            aof
        } else {
            left
        };
        let implicit = self.ast.argument(implicit);

        if let NodeKind::Call(def) = &mut self.ast.node_mut(call).kind {
            def.args.values.insert(0, Some(implicit));
        }

        trace!("method call rewritten into plain call");
        self.ast.replace_with_node(mcall, call);
        self.check_call(mcall)
    }

    pub(crate) fn check_size_of(&mut self, so: NodeId) -> CheckResult {
        let type_expr = match &self.ast.node(so).kind {
            NodeKind::SizeOf { type_expr, .. } => *type_expr,
            _ => return Ok(()),
        };
        let span = self.span_of(so);

        self.check_type(type_expr)?;
        let Some(ty) = self.build_type_from_ast(type_expr) else {
            return Err(self.yield_now(span, "the type to take the size of"));
        };

        let size = self.types.size_of(ty) as u64;
        if let NodeKind::SizeOf { size: slot, .. } = &mut self.ast.node_mut(so).kind {
            *slot = Some(size);
        }
        let u32_ = self.types.basic.u32_;
        self.set_ty(so, u32_);
        self.add_flag(so, NodeFlags::COMPTIME);
        Ok(())
    }

    pub(crate) fn check_align_of(&mut self, ao: NodeId) -> CheckResult {
        let type_expr = match &self.ast.node(ao).kind {
            NodeKind::AlignOf { type_expr, .. } => *type_expr,
            _ => return Ok(()),
        };
        let span = self.span_of(ao);

        self.check_type(type_expr)?;
        let Some(ty) = self.build_type_from_ast(type_expr) else {
            return Err(self.yield_now(span, "the type to take the alignment of"));
        };

        let alignment = self.types.alignment_of(ty) as u64;
        if let NodeKind::AlignOf { alignment: slot, .. } = &mut self.ast.node_mut(ao).kind {
            *slot = Some(alignment);
        }
        let u32_ = self.types.basic.u32_;
        self.set_ty(ao, u32_);
        self.add_flag(ao, NodeFlags::COMPTIME);
        Ok(())
    }

    pub(crate) fn check_argument(&mut self, arg: NodeId) -> CheckResult {
        let value = match &self.ast.node(arg).kind {
            NodeKind::Argument { value } => *value,
            _ => return Ok(()),
        };
        self.check_expression(value)?;
        if let Some(ty) = self.ty_of(value) {
            self.set_ty(arg, ty);
        }
        if self.is_comptime(value) {
            self.add_flag(arg, NodeFlags::COMPTIME);
        }
        Ok(())
    }

    pub(crate) fn check_arguments(&mut self, args: &CallArgs) -> CheckResult {
        for value in args.values.iter().flatten() {
            self.check_expression(*value)?;
        }
        for nv in &args.named {
            self.check_expression(nv.value)?;
        }
        Ok(())
    }
}
