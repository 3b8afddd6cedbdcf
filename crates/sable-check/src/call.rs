//! Call resolution.
//!
//! Callees resolve through a fixed order: overload sets by argument types,
//! then macro headers, then polymorphic procedures (looped, since a
//! resolved polymorph may itself be overloaded). Arguments are expanded to
//! the formal parameter count with named and default values, call-site
//! arguments are materialized, intrinsics are re-kinded, and macro calls
//! expand in place.

use tracing::{debug, trace};

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Resolution, TypeMatch};
use crate::types::Type;
use crate::Checker;

/// Unwrap an `Argument` wrapper down to the carried value.
fn arg_value(checker: &Checker, id: NodeId) -> NodeId {
    match &checker.ast.node(id).kind {
        NodeKind::Argument { value } => *value,
        _ => id,
    }
}

impl Checker {
    pub(crate) fn check_call(&mut self, call: NodeId) -> CheckResult {
        let span = self.span_of(call);

        // A call whose callee is a polymorphic struct is really a type
        // application; rewrite and re-check as a type expression.
        let (callee, is_intrinsic_call) = match &self.ast.node(call).kind {
            NodeKind::Call(def) => (def.callee, def.intrinsic.is_some()),
            _ => return Ok(()),
        };
        if !is_intrinsic_call {
            let stripped = self.strip_aliases(callee);
            if matches!(self.ast.node(stripped).kind, NodeKind::PolyStructDecl(_)) {
                let params: Vec<NodeId> = match &self.ast.node(call).kind {
                    NodeKind::Call(def) => def.args.values.iter().flatten().copied().collect(),
                    _ => Vec::new(),
                };
                let mut pc = Node::new(NodeKind::PolyCallType {
                    callee: stripped,
                    params,
                });
                pc.span = span;
                self.ast.replace(call, pc);
                return self.check_expression(call);
            }
        }

        if self.ast.node(call).checked() {
            return Ok(());
        }

        let saved_level = self.checking_level;
        self.check_expression(callee)?;
        let args = match &self.ast.node(call).kind {
            NodeKind::Call(def) => def.args.clone(),
            _ => CallArgs::default(),
        };
        self.check_arguments(&args)?;
        self.checking_level = saved_level;

        let callee = self.resolve_callee(call)?;

        if let NodeKind::Function(def) = &self.ast.node(callee).kind {
            if !def.constraints.constraints.is_empty() && !def.constraints.constraints_met {
                return Err(self.yield_now(span, "constraints to be checked on the callee"));
            }
        }

        self.fill_in_arguments(call, callee)?;

        let all_given = match &self.ast.node(call).kind {
            NodeKind::Call(def) => def.args.values.iter().all(|v| v.is_some()),
            _ => true,
        };
        if !all_given {
            return Err(self.error(span, CheckError::MissingArguments));
        }

        self.materialize_call_sites(call)?;

        // Intrinsic functions re-kind the call.
        let intrinsic_name = match &self.ast.node(callee).kind {
            NodeKind::Function(def) => def.intrinsic_name.clone(),
            _ => None,
        };
        if let Some(name) = intrinsic_name {
            let Some(intrinsic) = Intrinsic::from_name(&name) else {
                let cspan = self.span_of(callee);
                return Err(self.error(cspan, CheckError::UnknownIntrinsic(name)));
            };
            if let NodeKind::Call(def) = &mut self.ast.node_mut(call).kind {
                def.intrinsic = Some(intrinsic);
            }
            debug!(?intrinsic, "re-kinded call as intrinsic");
        }

        let callee_ty = self.ty_of(callee).expect("resolved callee is typed");
        let return_type = self
            .types
            .function_type(callee_ty)
            .expect("resolved callee has a function type")
            .return_type;
        self.set_ty(call, return_type);

        let original_callee = match &self.ast.node(call).kind {
            NodeKind::Call(def) => def.callee,
            _ => callee,
        };
        let calling_a_macro = matches!(
            self.ast.node(self.strip_aliases(original_callee)).kind,
            NodeKind::Macro(_)
        );

        if self.types.is_auto_return(return_type) && !calling_a_macro {
            return Err(self.yield_now(span, "the auto-return type to be solved"));
        }

        match self.check_arguments_against_type(call, callee)? {
            TypeMatch::Yield => return Err(self.yield_now(span, "argument type checking")),
            TypeMatch::Failed => return Err(Interrupt::Error),
            TypeMatch::Success => {}
        }

        self.add_flag(call, NodeFlags::HAS_BEEN_CHECKED);
        self.add_flag(callee, NodeFlags::FUNCTION_USED);

        if calling_a_macro {
            self.expand_macro(call, callee);
            return Err(Interrupt::ReturnToSymres);
        }

        Ok(())
    }

    /// Resolve the callee through aliases, overload sets, macros and
    /// polymorphic procedures, and demand a function type.
    fn resolve_callee(&mut self, call: NodeId) -> CheckResult<NodeId> {
        let span = self.span_of(call);
        let (raw_callee, args, is_intrinsic) = match &self.ast.node(call).kind {
            NodeKind::Call(def) => (def.callee, def.args.clone(), def.intrinsic.is_some()),
            _ => return Err(Interrupt::Error),
        };
        if is_intrinsic {
            return Ok(self.strip_aliases(raw_callee));
        }

        let mut callee = self.strip_aliases(raw_callee);
        let mut calling_a_macro = false;

        if let NodeKind::OverloadedFunction(def) = &self.ast.node(callee).kind {
            let overloads = def.overloads.clone();
            match self.find_matching_overload_by_arguments(&overloads, &args)? {
                Resolution::NoMatch => {
                    return Err(self.report_unable_to_match_overload(span, overloads.len()));
                }
                Resolution::Yield => {
                    return Err(self.yield_now(
                        span,
                        "an overloaded function option to pass type-checking",
                    ));
                }
                Resolution::Found(new_callee) => callee = self.strip_aliases(new_callee),
            }
        }

        if matches!(self.ast.node(callee).kind, NodeKind::Macro(_)) {
            calling_a_macro = true;
            if let NodeKind::Call(def) = &mut self.ast.node_mut(call).kind {
                def.callee = callee;
            }

            match self.macro_resolve_header(callee, &args)? {
                Resolution::NoMatch => {
                    return Err(self.error(
                        span,
                        CheckError::Message(
                            "Unable to match arguments to this macro's header".to_string(),
                        ),
                    ));
                }
                Resolution::Yield => {
                    return Err(
                        self.yield_now(span, "the macro header to pass type-checking")
                    );
                }
                Resolution::Found(header) => callee = header,
            }
        } else {
            while matches!(self.ast.node(callee).kind, NodeKind::PolyProc(_)) {
                match self.polymorphic_proc_lookup(callee, &args, span)? {
                    Resolution::NoMatch => {
                        return Err(self.error(
                            span,
                            CheckError::Message(
                                "Could not solve for the polymorphic variables of this call"
                                    .to_string(),
                            ),
                        ));
                    }
                    Resolution::Yield => {
                        return Err(self.yield_now(
                            span,
                            "the polymorphic procedure header to pass type-checking",
                        ));
                    }
                    Resolution::Found(new_callee) => callee = self.strip_aliases(new_callee),
                }
            }
        }

        self.fill_in_type(callee)?;
        if self.ty_of(callee).is_none() {
            return Err(self.yield_now(span, "the callee's function type"));
        }

        if !calling_a_macro {
            if let NodeKind::Call(def) = &mut self.ast.node_mut(call).kind {
                def.callee = callee;
            }
        }

        let callee_ty = self.ty_of(callee).expect("checked above");
        if self.types.function_type(callee_ty).is_none() {
            let name = callee_name(self, callee);
            return Err(self.error(span, CheckError::NotCallable(name)));
        }

        Ok(callee)
    }

    fn report_unable_to_match_overload(&mut self, span: Span, candidates: usize) -> Interrupt {
        self.error(
            span,
            CheckError::Message(format!(
                "Unable to match this call against any of the {candidates} overload options",
            )),
        )
    }

    /// Pick the first overload whose header accepts the arguments. Any
    /// candidate that has not finished header checking yields the whole
    /// lookup.
    pub(crate) fn find_matching_overload_by_arguments(
        &mut self,
        overloads: &[NodeId],
        args: &CallArgs,
    ) -> CheckResult<Resolution> {
        let mut candidates = Vec::new();
        self.build_all_overload_options(overloads, &mut candidates);

        for candidate in candidates {
            let candidate = self.strip_aliases(candidate);
            match &self.ast.node(candidate).kind {
                NodeKind::Function(_) => {
                    if self.ty_of(candidate).is_none() {
                        return Ok(Resolution::Yield);
                    }
                    match self.args_match_function(candidate, args)? {
                        TypeMatch::Success => return Ok(Resolution::Found(candidate)),
                        TypeMatch::Yield => return Ok(Resolution::Yield),
                        TypeMatch::Failed => {}
                    }
                }
                NodeKind::Macro(def) => {
                    let header = def.body;
                    if self.ty_of(header).is_none() {
                        return Ok(Resolution::Yield);
                    }
                    match self.args_match_function(header, args)? {
                        TypeMatch::Success => return Ok(Resolution::Found(candidate)),
                        TypeMatch::Yield => return Ok(Resolution::Yield),
                        TypeMatch::Failed => {}
                    }
                }
                NodeKind::PolyProc(_) => {
                    match self.poly_proc_could_match(candidate, args)? {
                        TypeMatch::Success => return Ok(Resolution::Found(candidate)),
                        TypeMatch::Yield => return Ok(Resolution::Yield),
                        TypeMatch::Failed => {}
                    }
                }
                _ => {}
            }
        }

        Ok(Resolution::NoMatch)
    }

    /// Flatten nested overload sets into one ordered candidate list.
    pub(crate) fn build_all_overload_options(
        &self,
        overloads: &[NodeId],
        out: &mut Vec<NodeId>,
    ) {
        for &overload in overloads {
            let stripped = self.strip_aliases(overload);
            match &self.ast.node(stripped).kind {
                NodeKind::OverloadedFunction(def) => {
                    let nested = def.overloads.clone();
                    self.build_all_overload_options(&nested, out);
                }
                _ => {
                    if !out.contains(&stripped) {
                        out.push(stripped);
                    }
                }
            }
        }
    }

    /// Probe whether the arguments could bind to this function's formals.
    /// Read-only: nothing is coerced or marked.
    pub(crate) fn args_match_function(
        &mut self,
        fn_node: NodeId,
        args: &CallArgs,
    ) -> CheckResult<TypeMatch> {
        let Some(fn_ty) = self.ty_of(fn_node) else {
            return Ok(TypeMatch::Yield);
        };
        let Some(fn_type) = self.types.function_type(fn_ty).cloned() else {
            return Ok(TypeMatch::Failed);
        };
        let def = match &self.ast.node(fn_node).kind {
            NodeKind::Function(def) => (**def).clone(),
            _ => return Ok(TypeMatch::Failed),
        };

        let has_varargs = matches!(
            fn_type.params.last().map(|t| self.types.get(*t)),
            Some(Type::VarArgs { .. })
        );
        let fixed = fn_type.params.len() - usize::from(has_varargs);

        // Slot named arguments by parameter name.
        let mut slots: Vec<Option<NodeId>> = args.values.clone();
        for nv in &args.named {
            let Some(idx) = def.params.iter().position(|p| {
                matches!(&self.ast.node(p.local).kind, NodeKind::Param { name } if *name == nv.name)
            }) else {
                return Ok(TypeMatch::Failed);
            };
            while slots.len() <= idx {
                slots.push(None);
            }
            if slots[idx].is_none() {
                slots[idx] = Some(nv.value);
            }
        }

        if slots.len() > fixed && !has_varargs {
            return Ok(TypeMatch::Failed);
        }

        for i in 0..fixed {
            match slots.get(i).copied().flatten() {
                Some(value) => {
                    let value = arg_value(self, value);
                    match self.can_coerce(value, fn_type.params[i]) {
                        TypeMatch::Success => {}
                        other => return Ok(other),
                    }
                }
                None => {
                    if def.params.get(i).and_then(|p| p.default_value).is_none() {
                        return Ok(TypeMatch::Failed);
                    }
                }
            }
        }

        if has_varargs {
            let elem = match self.types.get(*fn_type.params.last().expect("varargs checked")) {
                Type::VarArgs { elem } => *elem,
                _ => return Ok(TypeMatch::Failed),
            };
            for value in slots.iter().skip(fixed).flatten() {
                let value = arg_value(self, *value);
                if self.types.is_rawptr(elem) {
                    // Untyped var-args accept anything with a known type.
                    if self.ty_of(value).is_none() {
                        return Ok(TypeMatch::Yield);
                    }
                    continue;
                }
                match self.can_coerce(value, elem) {
                    TypeMatch::Success => {}
                    other => return Ok(other),
                }
            }
        }

        Ok(TypeMatch::Success)
    }

    /// Read-only coercion test used by overload probing.
    pub(crate) fn can_coerce(&self, value: NodeId, target: TypeId) -> TypeMatch {
        if let NodeKind::UnaryFieldAccess { field } = &self.ast.node(value).kind {
            return match self.types.get(target) {
                Type::Enum(en) if en.values.iter().any(|(name, _)| name == field) => {
                    TypeMatch::Success
                }
                _ => TypeMatch::Failed,
            };
        }

        if let NodeKind::Unary { op: UnaryOp::AutoCast, expr } = self.ast.node(value).kind {
            return match self.ty_of(expr) {
                Some(src) => match self.cast_is_legal(src, target) {
                    Ok(()) => TypeMatch::Success,
                    Err(_) => TypeMatch::Failed,
                },
                None => TypeMatch::Yield,
            };
        }

        let Some(ty) = self.ty_of(value) else {
            return TypeMatch::Yield;
        };

        // Unsized literals bind by value: an integer literal can become any
        // numeric type it fits in, a float literal only a float type.
        if self.types.is_unsized_literal(ty) {
            if let NodeKind::NumLit { value } = &self.ast.node(value).kind {
                let ok = match value {
                    NumValue::Int(v) => {
                        (self.types.is_integer(target) && self.int_fits(*v, target))
                            || self.types.is_float(target)
                            || self.types.is_enum(target)
                    }
                    NumValue::Float(_) => self.types.is_float(target),
                    NumValue::Bool(_) => self.types.is_bool(target),
                };
                return if ok { TypeMatch::Success } else { TypeMatch::Failed };
            }
        }

        if ty == target || self.types.compatible(ty, target) {
            return TypeMatch::Success;
        }

        if let (Type::Array { elem: ae, .. }, Type::Slice { elem: se }) =
            (self.types.get(ty), self.types.get(target))
        {
            if ae == se {
                return TypeMatch::Success;
            }
        }

        TypeMatch::Failed
    }

    /// Expand the argument list to the formal parameter count, slotting
    /// named arguments and cloning defaulted parameter values.
    fn fill_in_arguments(&mut self, call: NodeId, callee: NodeId) -> CheckResult {
        let span = self.span_of(call);
        let def = match &self.ast.node(callee).kind {
            NodeKind::Function(def) => (**def).clone(),
            _ => return Ok(()),
        };

        let named = match &self.ast.node(call).kind {
            NodeKind::Call(c) => c.args.named.clone(),
            _ => Vec::new(),
        };

        if let NodeKind::Call(c) = &mut self.ast.node_mut(call).kind {
            c.args.ensure_length(def.params.len());
        }

        for nv in named {
            let Some(idx) = def.params.iter().position(|p| {
                matches!(&self.ast.node(p.local).kind, NodeKind::Param { name } if *name == nv.name)
            }) else {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "'{}' is not a parameter of '{}'",
                        nv.name, def.name
                    )),
                ));
            };

            let occupied = match &self.ast.node(call).kind {
                NodeKind::Call(c) => c.args.values.get(idx).copied().flatten().is_some(),
                _ => false,
            };
            if occupied {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Multiple values given for parameter '{}'",
                        nv.name
                    )),
                ));
            }
            if let NodeKind::Call(c) = &mut self.ast.node_mut(call).kind {
                c.args.values[idx] = Some(nv.value);
            }
        }

        for (i, param) in def.params.iter().enumerate() {
            let empty = match &self.ast.node(call).kind {
                NodeKind::Call(c) => c.args.values.get(i).copied().flatten().is_none(),
                _ => false,
            };
            if !empty || param.vararg_kind != VarArgKind::NotVA {
                continue;
            }
            if let Some(default) = param.default_value {
                let value = self.ast.clone_subtree(default);
                self.check_expression(value)?;
                if let NodeKind::Call(c) = &mut self.ast.node_mut(call).kind {
                    c.args.values[i] = Some(value);
                }
            }
        }

        Ok(())
    }

    /// Rewrite `#callsite` arguments into clones populated with the call's
    /// location; the filename literal becomes its own entity.
    fn materialize_call_sites(&mut self, call: NodeId) -> CheckResult {
        let span = self.span_of(call);
        let values: Vec<NodeId> = match &self.ast.node(call).kind {
            NodeKind::Call(def) => def.args.values.iter().flatten().copied().collect(),
            _ => Vec::new(),
        };

        for slot in values {
            let value = arg_value(self, slot);
            if !matches!(self.ast.node(value).kind, NodeKind::CallSite(_)) {
                continue;
            }
            if matches!(&self.ast.node(value).kind, NodeKind::CallSite(cs) if cs.filename.is_some())
            {
                continue;
            }

            let filename = self.ast.str_lit("<source>");
            self.ast.node_mut(filename).span = span;
            let str_ = self.types.basic.str_;
            self.set_ty(filename, str_);
            self.add_flag(filename, NodeFlags::COMPTIME);
            self.add_entities_for_node(filename, None);

            let u32_ = self.types.basic.u32_;
            let mut line = Node::new(NodeKind::NumLit {
                value: NumValue::Int(span.start as i64),
            });
            line.span = span;
            line.ty = Some(u32_);
            line.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
            let line = self.ast.alloc(line);

            let mut column = Node::new(NodeKind::NumLit {
                value: NumValue::Int(span.end as i64),
            });
            column.span = span;
            column.ty = Some(u32_);
            column.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
            let column = self.ast.alloc(column);

            let callsite_ty = self.builtins.callsite_type;
            let mut cloned = Node::new(NodeKind::CallSite(Box::new(CallSiteDef {
                filename: Some(filename),
                line: Some(line),
                column: Some(column),
            })));
            cloned.span = span;
            cloned.ty = Some(callsite_ty);
            cloned.flags |= NodeFlags::COMPTIME;
            self.ast.replace(value, cloned);
            trace!("materialized call-site argument");
        }

        Ok(())
    }

    /// Verify actual argument types against the formals, coercing through
    /// unification and classifying var-args.
    fn check_arguments_against_type(
        &mut self,
        call: NodeId,
        callee: NodeId,
    ) -> CheckResult<TypeMatch> {
        let span = self.span_of(call);
        let callee_ty = self.ty_of(callee).expect("resolved callee is typed");
        let fn_type = self
            .types
            .function_type(callee_ty)
            .expect("resolved callee has a function type")
            .clone();
        let callee_def_varargs = match &self.ast.node(callee).kind {
            NodeKind::Function(def) => def
                .params
                .iter()
                .map(|p| p.vararg_kind)
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        let values: Vec<NodeId> = match &self.ast.node(call).kind {
            NodeKind::Call(def) => def.args.values.iter().flatten().copied().collect(),
            _ => Vec::new(),
        };

        let has_varargs = matches!(
            fn_type.params.last().map(|t| self.types.get(*t)),
            Some(Type::VarArgs { .. })
        );
        let fixed = fn_type.params.len() - usize::from(has_varargs);

        if values.len() < fixed || (values.len() > fn_type.params.len() && !has_varargs) {
            self.sink.error(
                span,
                CheckError::Message(format!(
                    "Wrong number of arguments: expected {}{}, got {}",
                    fixed,
                    if has_varargs { "+" } else { "" },
                    values.len()
                )),
            );
            return Ok(TypeMatch::Failed);
        }

        for (i, &slot) in values.iter().enumerate().take(fixed) {
            let value = arg_value(self, slot);
            if !self.unify(value, fn_type.params[i])? {
                self.sink.error(
                    span,
                    CheckError::Message(format!(
                        "Argument {} expected type '{}', got '{}'",
                        i + 1,
                        self.types.name(fn_type.params[i]),
                        self.type_name_of(value)
                    )),
                );
                return Ok(TypeMatch::Failed);
            }
            if let Some(ty) = self.ty_of(value) {
                if slot != value {
                    self.set_ty(slot, ty);
                }
            }
        }

        let mut va_kind = VarArgKind::NotVA;
        if has_varargs {
            let last = *fn_type.params.last().expect("varargs checked");
            let elem = match self.types.get(last) {
                Type::VarArgs { elem } => *elem,
                _ => unreachable!("guarded by has_varargs"),
            };

            va_kind = match callee_def_varargs.last() {
                Some(VarArgKind::Untyped) => VarArgKind::Untyped,
                _ => VarArgKind::Typed,
            };

            for &slot in values.iter().skip(fixed) {
                let value = arg_value(self, slot);
                if va_kind == VarArgKind::Untyped {
                    if self.resolve_expression_type(value).is_none() {
                        return Ok(TypeMatch::Yield);
                    }
                    continue;
                }
                if !self.unify(value, elem)? {
                    self.sink.error(
                        span,
                        CheckError::Message(format!(
                            "Variadic argument expected type '{}', got '{}'",
                            self.types.name(elem),
                            self.type_name_of(value)
                        )),
                    );
                    return Ok(TypeMatch::Failed);
                }
            }
        }

        if let NodeKind::Call(def) = &mut self.ast.node_mut(call).kind {
            def.va_kind = Some(va_kind);
        }

        Ok(TypeMatch::Success)
    }

    /// Resolve a macro's header against the call arguments.
    pub(crate) fn macro_resolve_header(
        &mut self,
        macro_node: NodeId,
        args: &CallArgs,
    ) -> CheckResult<Resolution> {
        let header = match &self.ast.node(macro_node).kind {
            NodeKind::Macro(def) => def.body,
            _ => return Ok(Resolution::NoMatch),
        };

        if self.ty_of(header).is_none() {
            return Ok(Resolution::Yield);
        }

        match self.args_match_function(header, args)? {
            TypeMatch::Success => Ok(Resolution::Found(header)),
            TypeMatch::Yield => Ok(Resolution::Yield),
            TypeMatch::Failed => Ok(Resolution::NoMatch),
        }
    }

    /// Splice the macro's body over the call node.
    pub(crate) fn expand_macro(&mut self, call: NodeId, header: NodeId) {
        let body = match &self.ast.node(header).kind {
            NodeKind::Function(def) => def.body,
            _ => None,
        };
        let Some(body) = body else { return };

        debug!("expanding macro body in place of call");
        let cloned = self.ast.clone_subtree(body);
        if let NodeKind::Block(def) = &mut self.ast.node_mut(cloned).kind {
            def.rules = BlockRule::Macro;
        }
        self.ast.replace_with_node(call, cloned);
    }
}

fn callee_name(checker: &Checker, callee: NodeId) -> String {
    match &checker.ast.node(callee).kind {
        NodeKind::Function(def) => def.name.clone(),
        other => other.name().to_string(),
    }
}
