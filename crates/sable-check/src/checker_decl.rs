//! Declaration checking: function headers and bodies, overload sets,
//! structs and their defaulted members, memory reservations, and macros.

use tracing::debug;

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Progress};
use crate::types::StructStatus;
use crate::{Checker, EntityState, ReturnSlot};

impl Checker {
    /// Access the constraint context carried by a function or struct node.
    pub(crate) fn constraint_context(&self, owner: NodeId) -> Option<&ConstraintContext> {
        match &self.ast.node(owner).kind {
            NodeKind::Function(def) => Some(&def.constraints),
            NodeKind::StructDecl(def) => Some(&def.constraints),
            _ => None,
        }
    }

    pub(crate) fn constraint_context_mut(
        &mut self,
        owner: NodeId,
    ) -> Option<&mut ConstraintContext> {
        match &mut self.ast.node_mut(owner).kind {
            NodeKind::Function(def) => Some(&mut def.constraints),
            NodeKind::StructDecl(def) => Some(&mut def.constraints),
            _ => None,
        }
    }

    pub(crate) fn check_function_header(&mut self, func: NodeId) -> CheckResult {
        let span = self.span_of(func);
        let def = match &self.ast.node(func).kind {
            NodeKind::Function(def) => (**def).clone(),
            _ => return Ok(()),
        };

        if !def.constraints.constraints.is_empty() && !def.constraints.constraints_met {
            let produce_errors = !self.has_flag(func, NodeFlags::HEADER_CHECK_NO_ERROR);
            if let Some(cc) = self.constraint_context_mut(func) {
                cc.produce_errors = produce_errors;
            }
            self.check_constraint_context(func, def.scope, span)?;

            // All constraints newly satisfied: the symbols the constrained
            // code mentions still need resolving.
            return Err(Interrupt::ReturnToSymres);
        }

        let mut expect_default_param = false;
        let mut has_had_varargs = false;

        for param in &def.params {
            let local = param.local;
            let lspan = self.span_of(local);

            if expect_default_param && param.default_value.is_none() {
                return Err(self.error(
                    lspan,
                    CheckError::Message(
                        "All parameters must have default values after the first default valued parameter"
                            .to_string(),
                    ),
                ));
            }

            if has_had_varargs {
                return Err(self.error(
                    lspan,
                    CheckError::Message(
                        "Variadic arguments must be last in the parameter list".to_string(),
                    ),
                ));
            }

            if param.vararg_kind == VarArgKind::Untyped {
                let any = self.builtins.vararg_any;
                let va = self.types.varargs_of(any);
                self.set_ty(local, va);
            }

            if let Some(default) = param.default_value {
                if param.vararg_kind != VarArgKind::NotVA {
                    return Err(self.error(
                        lspan,
                        CheckError::Message(
                            "Variadic arguments cannot have default values".to_string(),
                        ),
                    ));
                }

                self.check_expression(default)?;

                // Defaults may supply the parameter type, but they are not
                // checked against a declared type here; the call site does
                // that when the default is actually used.
                if self.ast.node(local).type_node.is_none() && self.ty_of(local).is_none() {
                    if let Some(ty) = self.resolve_expression_type(default) {
                        self.set_ty(local, ty);
                    }
                }

                expect_default_param = true;
            }

            if let Some(type_node) = self.ast.node(local).type_node {
                let no_error = self.ast.node(func).flags & NodeFlags::HEADER_CHECK_NO_ERROR;
                self.ast.node_mut(type_node).flags |= no_error;
                self.check_type(type_node)?;
            }

            self.fill_in_type(local)?;
            let Some(local_ty) = self.ty_of(local) else {
                return Err(self.yield_now(lspan, "this parameter's type"));
            };

            if self.types.is_compound(local_ty) {
                return Err(self.error(
                    lspan,
                    CheckError::Message(
                        "Compound types are not allowed as parameter types. Try splitting this into multiple parameters"
                            .to_string(),
                    ),
                ));
            }

            if param.vararg_kind != VarArgKind::NotVA {
                has_had_varargs = true;
            }

            let is_array = matches!(
                self.types.get(local_ty),
                crate::types::Type::Array { .. }
            );
            if !is_array && self.types.size_of(local_ty) == 0 {
                return Err(self.error(
                    lspan,
                    CheckError::Message(
                        "Function parameters cannot have zero-width types".to_string(),
                    ),
                ));
            }
        }

        if let Some(ret) = def.return_type_node {
            self.check_type(ret)?;
        }

        if self.ty_of(func).is_none() {
            let mut param_types = Vec::with_capacity(def.params.len());
            for param in &def.params {
                let ty = self
                    .ty_of(param.local)
                    .expect("parameter types resolved above");
                param_types.push(ty);
            }

            let return_type = match def.return_type_node {
                Some(ret) => {
                    let Some(ty) = self.build_type_from_ast(ret) else {
                        return Err(self.yield_now(span, "the function type to be constructed"));
                    };
                    ty
                }
                None => self.types.basic.auto_return,
            };

            let fn_ty = self.types.function(param_types, return_type);
            self.set_ty(func, fn_ty);
            debug!(name = %def.name, "built function type");
        }

        Ok(())
    }

    /// Trial-mode header check used by polymorph queries: errors under
    /// `HEADER_CHECK_NO_ERROR` are swallowed into a plain failure.
    pub(crate) fn check_temp_function_header(&mut self, func: NodeId) -> CheckResult<Progress> {
        let suppress = self.has_flag(func, NodeFlags::HEADER_CHECK_NO_ERROR);
        let mark = if suppress {
            Some(self.sink.begin_probe())
        } else {
            None
        };

        let result = self.check_function_header(func);

        if let Some(mark) = mark {
            self.sink.end_probe(mark, !matches!(result, Err(Interrupt::Error)));
        }

        match result {
            Err(Interrupt::Error) => Err(Interrupt::Failed),
            Err(other) => Err(other),
            Ok(()) => Ok(Progress::Complete),
        }
    }

    pub(crate) fn check_function(&mut self, func: NodeId) -> CheckResult {
        if self.ast.node(func).checked() {
            return Ok(());
        }
        let span = self.span_of(func);

        let def = match &self.ast.node(func).kind {
            NodeKind::Function(def) => (**def).clone(),
            _ => return Ok(()),
        };

        if let Some(header) = def.entity_header {
            if self.entities.state(header) < EntityState::CodeGen {
                return Err(self.yield_now(span, "the procedure header to pass type-checking"));
            }
        }

        for tag in &def.tags {
            self.check_expression(*tag)?;
            if !self.is_comptime(*tag) {
                let tspan = self.span_of(*tag);
                return Err(self.error(tspan, CheckError::TagNotComptime));
            }
        }

        let fn_ty = match self.ty_of(func) {
            Some(ty) => ty,
            None => return Err(self.yield_now(span, "this function's type")),
        };

        self.inside_for_iterator = false;
        let old_expected_return = self.expected_return;
        self.expected_return = Some(ReturnSlot::FunctionType(fn_ty));

        if let Some(body) = def.body {
            let status = self.check_block(body);
            if let Err(Interrupt::Error) = status {
                if let Some(generated_from) = def.generated_from {
                    if !self.cycle_detected {
                        self.sink.error(
                            generated_from,
                            CheckError::Message(
                                "Error in polymorphic procedure generated from this location"
                                    .to_string(),
                            ),
                        );
                    }
                }
            }
            if status.is_err() {
                self.expected_return = old_expected_return;
                return status;
            }
        }

        if self
            .expected_return_type()
            .is_some_and(|t| self.types.is_auto_return(t))
        {
            let void = self.types.basic.void;
            self.set_expected_return_type(void);
        }
        self.expected_return = old_expected_return;

        self.add_flag(func, NodeFlags::HAS_BEEN_CHECKED);
        Ok(())
    }

    /// An overload set is done once every candidate header has passed type
    /// checking; bodies are not this entity's concern.
    pub(crate) fn check_overloaded_function(&mut self, node: NodeId) -> CheckResult {
        let span = self.span_of(node);
        let overloads = match &self.ast.node(node).kind {
            NodeKind::OverloadedFunction(def) => def.overloads.clone(),
            _ => return Ok(()),
        };

        let mut candidates = Vec::new();
        self.build_all_overload_options(&overloads, &mut candidates);

        let mut done = true;
        for candidate in candidates {
            match &self.ast.node(candidate).kind {
                NodeKind::Function(def) => {
                    if let Some(header) = def.entity_header {
                        if self.entities.state(header) <= EntityState::CheckTypes {
                            done = false;
                        }
                    } else if self.ty_of(candidate).is_none() {
                        done = false;
                    }
                }
                NodeKind::PolyProc(_) | NodeKind::Macro(_) => {}
                other => {
                    let cspan = self.span_of(candidate);
                    return Err(self.error(
                        cspan,
                        CheckError::Message(format!(
                            "Overload option is not a procedure or macro. Got '{}'",
                            other.name()
                        )),
                    ));
                }
            }
        }

        if done {
            Ok(())
        } else {
            Err(self.yield_now(span, "all overload options to pass type-checking"))
        }
    }

    pub(crate) fn check_struct(&mut self, s_node: NodeId) -> CheckResult {
        let span = self.span_of(s_node);
        let def = match &self.ast.node(s_node).kind {
            NodeKind::StructDecl(def) => (**def).clone(),
            _ => return Ok(()),
        };

        if let Some(defaults) = def.entity_defaults {
            if self.entities.state(defaults) < EntityState::CheckTypes {
                return Err(self.yield_now(
                    span,
                    "struct member defaults to pass symbol resolution",
                ));
            }
        }

        for (i, arg_type_node) in def.poly_arg_types.iter().enumerate() {
            let Some(arg_type) = self.build_type_from_ast(*arg_type_node) else {
                let aspan = self.span_of(*arg_type_node);
                return Err(self.yield_now(aspan, "the polymorph argument's type"));
            };

            if let Some(value) = def.poly_arg_values.get(i).copied().flatten() {
                if !self.unify(value, arg_type)? {
                    let vspan = self.span_of(value);
                    return Err(self.error(
                        vspan,
                        CheckError::Mismatch {
                            expected: self.types.name(arg_type),
                            found: self.type_name_of(value),
                        },
                    ));
                }
            }
        }

        if !def.constraints.constraints.is_empty() && !def.constraints.constraints_met {
            let produce_errors = !self.has_flag(s_node, NodeFlags::HEADER_CHECK_NO_ERROR);
            if let Some(cc) = self.constraint_context_mut(s_node) {
                cc.produce_errors = produce_errors;
            }
            let pos = def.poly_error_loc.unwrap_or(span);
            self.check_constraint_context(s_node, def.scope, pos)?;
        }

        // Everything callable in the struct's scope counts as used.
        if let Some(scope) = def.scope {
            let symbols: Vec<NodeId> = self.scopes.symbol_nodes(scope).collect();
            for node in symbols {
                if matches!(self.ast.node(node).kind, NodeKind::Function(_)) {
                    self.add_flag(node, NodeFlags::FUNCTION_USED);
                }
            }
        }

        for (i, member) in def.members.iter().enumerate() {
            if let Some(type_node) = member.type_node {
                self.check_type(type_node)?;
            }

            let resolved = if member.type_node.is_none() {
                let Some(initial) = member.initial_value else {
                    return Err(self.error(
                        span,
                        CheckError::Message(format!(
                            "Struct member '{}' has no type and no initializer",
                            member.name
                        )),
                    ));
                };
                self.check_expression(initial)?;
                self.fill_in_type(initial)?;
                if self.ty_of(initial).is_none() {
                    let ispan = self.span_of(initial);
                    return Err(
                        self.yield_now(ispan, "the type of this member's initial value")
                    );
                }
                self.resolve_expression_type(initial)
            } else {
                let type_node = member.type_node.expect("guarded above");
                match self.build_type_from_ast(type_node) {
                    Some(ty) => Some(ty),
                    None => {
                        let mspan = self.span_of(type_node);
                        return Err(self.yield_now(mspan, "this member's type"));
                    }
                }
            };

            let Some(member_ty) = resolved else {
                return Err(self.error(
                    span,
                    CheckError::Message(format!(
                        "Unable to deduce the type of member '{}'",
                        member.name
                    )),
                ));
            };

            if let NodeKind::StructDecl(def) = &mut self.ast.node_mut(s_node).kind {
                def.members[i].ty = Some(member_ty);
            }
        }

        if let NodeKind::StructDecl(def) = &mut self.ast.node_mut(s_node).kind {
            def.ready_to_build_type = true;
        }
        self.build_type_from_ast(s_node);

        let (pending, valid) = match &self.ast.node(s_node).kind {
            NodeKind::StructDecl(def) => (def.pending_type, def.pending_type_is_valid),
            _ => (None, false),
        };
        let Some(pending) = pending.filter(|_| valid) else {
            return Err(self.yield_now(span, "the struct type to be constructed"));
        };

        let members = self
            .types
            .struct_type(pending)
            .map(|s| s.members.clone())
            .unwrap_or_default();
        for member in &members {
            if self.types.is_compound(member.ty) {
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "Compound types are not allowed as struct member types".to_string(),
                    ),
                ));
            }

            if member.used && !self.types.struct_member_apply_use(pending, member.idx) {
                return Err(self.yield_now(span, "the use to be applied"));
            }
        }

        if let Some(st) = self.types.struct_type_mut(pending) {
            st.status = StructStatus::UsesDone;
        }
        if let NodeKind::StructDecl(def) = &mut self.ast.node_mut(s_node).kind {
            def.built = Some(pending);
        }

        Ok(())
    }

    /// Tag expressions and member initializers are checked once the struct
    /// type itself has moved on to code generation.
    pub(crate) fn check_struct_defaults(&mut self, s_node: NodeId) -> CheckResult {
        let span = self.span_of(s_node);
        let def = match &self.ast.node(s_node).kind {
            NodeKind::StructDecl(def) => (**def).clone(),
            _ => return Ok(()),
        };

        if let Some(type_entity) = def.entity_type {
            if self.entities.state(type_entity) == EntityState::Failed {
                return Err(Interrupt::Failed);
            }
            if self.entities.state(type_entity) < EntityState::CodeGen {
                return Err(self.yield_now(
                    span,
                    "the struct type to be constructed before checking defaulted members",
                ));
            }
        }

        for tag in &def.meta_tags {
            self.check_expression(*tag)?;
            self.resolve_expression_type(*tag);
            if !self.is_comptime(*tag) {
                let tspan = self.span_of(*tag);
                return Err(self.error(tspan, CheckError::TagNotComptime));
            }
        }

        let Some(built) = def.built else {
            return Err(self.yield_now(span, "the struct type to be completed"));
        };

        let members = self
            .types
            .struct_type(built)
            .map(|s| s.members.clone())
            .unwrap_or_default();
        for member in members {
            if let Some(initial) = member.initial_value {
                self.check_expression(initial)?;

                if !self.unify(initial, member.ty)? {
                    let ispan = self.span_of(initial);
                    return Err(self.error(
                        ispan,
                        CheckError::Message(format!(
                            "Mismatched type for initial value, expected '{}', got '{}'",
                            self.types.name(member.ty),
                            self.type_name_of(initial)
                        )),
                    ));
                }
                self.resolve_expression_type(initial);
            }
        }

        for member in &def.members {
            for tag in &member.meta_tags {
                self.check_expression(*tag)?;
                self.resolve_expression_type(*tag);
                if !self.is_comptime(*tag) {
                    let tspan = self.span_of(*tag);
                    return Err(self.error(tspan, CheckError::TagNotComptime));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn check_memres_type(&mut self, memres: NodeId) -> CheckResult {
        let span = self.span_of(memres);
        let type_node = self.ast.node(memres).type_node;
        self.check_type_opt(type_node)?;
        self.fill_in_type(memres)?;
        if type_node.is_some() && self.ty_of(memres).is_none() {
            return Err(self.yield_now(span, "the global's type to be constructed"));
        }
        Ok(())
    }

    pub(crate) fn check_memres(&mut self, memres: NodeId) -> CheckResult {
        let span = self.span_of(memres);
        let def = match &self.ast.node(memres).kind {
            NodeKind::Memres(def) => (**def).clone(),
            _ => return Ok(()),
        };

        if let Some(type_entity) = def.type_entity {
            if self.entities.state(type_entity) < EntityState::CodeGen {
                return Err(self.yield_now(span, "the global to pass type construction"));
            }
        }

        if let Some(initial) = def.initial_value {
            if def.threadlocal {
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "thread-local variables cannot have an initializer".to_string(),
                    ),
                ));
            }

            self.check_expression(initial)?;

            if let Some(memres_ty) = self.ty_of(memres) {
                if !self.unify(initial, memres_ty)? {
                    return Err(self.error(
                        span,
                        CheckError::AssignMismatch {
                            expected: self.types.name(memres_ty),
                            found: self.type_name_of(initial),
                        },
                    ));
                }
            } else {
                self.resolve_expression_type(initial);
                match self.ty_of(initial) {
                    Some(ty) => self.set_ty(memres, ty),
                    None => {
                        if self
                            .entity_state_of(initial)
                            .is_some_and(|s| s <= EntityState::CheckTypes)
                        {
                            return Err(
                                self.yield_now(span, "the global's type to be constructed")
                            );
                        }
                        return Err(self.error(
                            span,
                            CheckError::Message(
                                "Could not resolve the type of this global's initializer"
                                    .to_string(),
                            ),
                        ));
                    }
                }
            }

            if !self.is_comptime(initial) {
                if self
                    .entity_state_of(initial)
                    .is_some_and(|s| s <= EntityState::CheckTypes)
                {
                    return Err(self.yield_now(span, "the initial value to be checked"));
                }
                let ispan = self.span_of(initial);
                return Err(self.error(ispan, CheckError::NotComptime));
            }
        }

        Ok(())
    }

    pub(crate) fn check_global(&mut self, global: NodeId) -> CheckResult {
        let span = self.span_of(global);
        self.fill_in_type(global)?;
        if self.ty_of(global).is_none() {
            return Err(self.yield_now(span, "the type of this global"));
        }
        Ok(())
    }

    /// A macro with a function body has its header checked ahead of use.
    pub(crate) fn check_macro(&mut self, macro_node: NodeId) -> CheckResult {
        let body = match &self.ast.node(macro_node).kind {
            NodeKind::Macro(def) => def.body,
            _ => return Ok(()),
        };
        if matches!(self.ast.node(body).kind, NodeKind::Function(_)) {
            self.check_function_header(body)?;
        }
        Ok(())
    }
}
