//! Statement, block and control-flow checking.
//!
//! Blocks remember how many statements already checked so a yield resumes
//! exactly where it stopped; a rewrite underneath (`ReturnToSymres`) resets
//! the resume point. The switch checker hoists case statements out of the
//! raw block, deduplicates integer cases through a value map, and
//! synthesizes equality comparisons for everything else.

use tracing::trace;

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt};
use crate::types::Type;
use crate::{Checker, CheckingLevel};

impl Checker {
    pub(crate) fn check_statement(&mut self, stmt: NodeId) -> CheckResult {
        self.checking_level = CheckingLevel::Statement;

        match &self.ast.node(stmt).kind {
            NodeKind::Jump => Ok(()),

            NodeKind::Return { .. } => self.check_return(stmt),
            NodeKind::If(_) | NodeKind::StaticIf(_) => self.check_if(stmt),
            NodeKind::While(_) => self.check_while(stmt),
            NodeKind::For(_) => self.check_for(stmt),
            NodeKind::Switch(_) => self.check_switch(stmt),
            NodeKind::Block(_) => self.check_block(stmt),
            NodeKind::Defer { stmt: deferred } => {
                let deferred = *deferred;
                self.check_statement(deferred)
            }
            NodeKind::Remove => self.check_remove_directive(stmt),

            NodeKind::Call(_) => {
                self.check_call(stmt)?;
                self.add_flag(stmt, NodeFlags::EXPR_IGNORED);
                Ok(())
            }

            NodeKind::Binary(_) => {
                self.check_binaryop(stmt)?;
                self.add_flag(stmt, NodeFlags::EXPR_IGNORED);
                Ok(())
            }

            // Locals stay in the tree; their declared type resolves here
            // and an immediately-following assignment is noted.
            NodeKind::Local { .. } => {
                self.fill_in_type(stmt)?;
                if self.ast.node(stmt).type_node.is_some() && self.ty_of(stmt).is_none() {
                    let type_node = self.ast.node(stmt).type_node.expect("checked above");
                    self.check_type(type_node)?;
                    if !self.ast.node(type_node).is_type_ast() {
                        let span = self.span_of(stmt);
                        return Err(self.error(
                            span,
                            CheckError::Message("Local's type is not a type".to_string()),
                        ));
                    }
                    let span = self.span_of(stmt);
                    return Err(self.yield_now(span, "this local variable's type"));
                }
                Ok(())
            }

            _ => {
                self.check_expression(stmt)?;
                self.add_flag(stmt, NodeFlags::EXPR_IGNORED);
                Ok(())
            }
        }
    }

    pub(crate) fn check_statement_chain(&mut self, stmts: &[NodeId]) -> CheckResult {
        for (i, stmt) in stmts.iter().enumerate() {
            self.note_decl_followed_by_init(stmts, i);
            self.check_statement(*stmt)?;
        }
        Ok(())
    }

    fn note_decl_followed_by_init(&mut self, stmts: &[NodeId], i: usize) {
        let stmt = stmts[i];
        if !matches!(self.ast.node(stmt).kind, NodeKind::Local { .. }) {
            return;
        }
        let Some(&next) = stmts.get(i + 1) else { return };
        if let NodeKind::Binary(def) = &self.ast.node(next).kind {
            if def.op == BinaryOp::Assign && def.left == stmt {
                self.add_flag(stmt, NodeFlags::DECL_FOLLOWED_BY_INIT);
            }
        }
    }

    /// Check a block, resuming after the statements that already passed.
    pub(crate) fn check_block(&mut self, block: NodeId) -> CheckResult {
        loop {
            let (stmts, idx) = match &self.ast.node(block).kind {
                NodeKind::Block(def) => (def.body.clone(), def.statement_idx),
                _ => return Ok(()),
            };

            if idx >= stmts.len() {
                return Ok(());
            }

            self.note_decl_followed_by_init(&stmts, idx);
            match self.check_statement(stmts[idx]) {
                Ok(()) => {
                    if let NodeKind::Block(def) = &mut self.ast.node_mut(block).kind {
                        def.statement_idx += 1;
                    }
                }
                Err(Interrupt::ReturnToSymres) => {
                    // The tree changed underneath; restart from the top
                    // once symbol resolution has run again.
                    if let NodeKind::Block(def) = &mut self.ast.node_mut(block).kind {
                        def.statement_idx = 0;
                    }
                    return Err(Interrupt::ReturnToSymres);
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub(crate) fn check_return(&mut self, retnode: NodeId) -> CheckResult {
        let span = self.span_of(retnode);
        let expr = match &self.ast.node(retnode).kind {
            NodeKind::Return { expr } => *expr,
            _ => None,
        };

        let Some(expected) = self.expected_return_type() else {
            return Ok(());
        };

        match expr {
            Some(expr) => {
                self.check_expression(expr)?;

                if self.types.is_auto_return(expected) {
                    // This return defines the automatic return type.
                    self.resolve_expression_type(expr);
                    let Some(ty) = self.ty_of(expr) else {
                        return Err(self.yield_error(
                            span,
                            "Unable to determine the automatic return type here",
                        ));
                    };
                    self.set_expected_return_type(ty);
                    return Ok(());
                }

                if !self.unify(expr, expected)? {
                    return Err(self.error(
                        span,
                        CheckError::ReturnMismatch {
                            expected: self.types.name(expected),
                            found: self.type_name_of(expr),
                        },
                    ));
                }

                // `return ^literal` can never be legal; the storage dies
                // with the frame.
                if let NodeKind::AddressOf { expr: inner, .. } = self.ast.node(expr).kind {
                    if self.ast.node(inner).is_addressable_literal() {
                        return Err(self.error(span, CheckError::ReturnAddressOfLiteral));
                    }
                }

                Ok(())
            }
            None => {
                if self.types.is_auto_return(expected) {
                    let void = self.types.basic.void;
                    self.set_expected_return_type(void);
                    return Ok(());
                }

                if self.types.size_of(expected) > 0 {
                    return Err(self.error(
                        span,
                        CheckError::MissingReturnValue(self.types.name(expected)),
                    ));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn check_if(&mut self, ifnode: NodeId) -> CheckResult {
        // Statement-position static-if: wait for the condition entity, then
        // check only the chosen branch and let it splice like a macro.
        if let NodeKind::StaticIf(def) = &self.ast.node(ifnode).kind {
            let (true_stmt, false_stmt, resolution) =
                (def.true_stmt, def.false_stmt, def.resolution);

            if !self.has_flag(ifnode, NodeFlags::STATIC_IF_RESOLVED) {
                let span = self.span_of(ifnode);
                return Err(self.yield_now(span, "this static if to be resolved"));
            }

            let chosen = if resolution == Some(true) {
                true_stmt
            } else {
                false_stmt
            };
            if let Some(stmt) = chosen {
                self.check_statement(stmt)?;
                if let NodeKind::Block(def) = &mut self.ast.node_mut(stmt).kind {
                    def.rules = BlockRule::Macro;
                }
            }
            return Ok(());
        }

        let (init, cond, true_stmt, false_stmt) = match &self.ast.node(ifnode).kind {
            NodeKind::If(def) => (def.init.clone(), def.cond, def.true_stmt, def.false_stmt),
            _ => return Ok(()),
        };

        self.check_statement_chain(&init)?;
        self.check_expression(cond)?;

        if !self.ty_of(cond).is_some_and(|t| self.types.is_bool(t)) {
            let cspan = self.span_of(cond);
            return Err(self.error(
                cspan,
                CheckError::ConditionNotBool {
                    found: self.type_name_of(cond),
                },
            ));
        }

        if let Some(stmt) = true_stmt {
            self.check_statement(stmt)?;
        }
        if let Some(stmt) = false_stmt {
            self.check_statement(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn check_while(&mut self, whilenode: NodeId) -> CheckResult {
        let (init, cond, true_stmt, false_stmt, bottom_test) =
            match &self.ast.node(whilenode).kind {
                NodeKind::While(def) => (
                    def.init.clone(),
                    def.cond,
                    def.true_stmt,
                    def.false_stmt,
                    def.bottom_test,
                ),
                _ => return Ok(()),
            };

        self.check_statement_chain(&init)?;
        self.check_expression(cond)?;

        if !self.ty_of(cond).is_some_and(|t| self.types.is_bool(t)) {
            let cspan = self.span_of(cond);
            return Err(self.error(
                cspan,
                CheckError::ConditionNotBool {
                    found: self.type_name_of(cond),
                },
            ));
        }

        if let Some(stmt) = true_stmt {
            self.check_statement(stmt)?;
        }
        if let Some(stmt) = false_stmt {
            if bottom_test {
                let span = self.span_of(whilenode);
                return Err(self.error(
                    span,
                    CheckError::Message(
                        "while-loops with an 'else' clause cannot be bottom tested".to_string(),
                    ),
                ));
            }
            self.check_statement(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn check_for(&mut self, fornode: NodeId) -> CheckResult {
        let span = self.span_of(fornode);
        let (var, iter, body, by_pointer, no_close) = match &self.ast.node(fornode).kind {
            NodeKind::For(def) => (def.var, def.iter, def.body, def.by_pointer, def.no_close),
            _ => return Ok(()),
        };

        if !self.ast.node(fornode).checked() {
            self.check_expression(iter)?;
            self.resolve_expression_type(iter);

            let Some(iter_type) = self.ty_of(iter) else {
                return Err(self.yield_now(span, "the iteration expression's type"));
            };

            let error_loc = {
                let vspan = self.span_of(var);
                if vspan == Span::default() { span } else { vspan }
            };

            let range_type = self.builtins.range_type;
            let loop_type;

            if self.types.is_integer(iter_type) {
                // Integer iterables sugar into `0 .. n`.
                if by_pointer {
                    return Err(self.error(error_loc, CheckError::BadPointerIteration("a range")));
                }

                let low = self.ast.int(0);
                self.ast.node_mut(low).span = span;
                let rl = self.ast.range(low, iter);
                self.ast.node_mut(rl).span = span;
                self.check_range_literal(rl)?;
                if let NodeKind::For(def) = &mut self.ast.node_mut(fornode).kind {
                    def.iter = rl;
                }

                let low_member = self
                    .types
                    .member_by_idx(range_type, 0)
                    .expect("builtin range type has members");
                self.set_ty(var, low_member.ty);
                self.add_flag(var, NodeFlags::CANNOT_TAKE_ADDR);
                loop_type = ForLoop::Range;
            } else if self.types.compatible(iter_type, range_type) {
                if by_pointer {
                    return Err(self.error(error_loc, CheckError::BadPointerIteration("a range")));
                }

                let low_member = self
                    .types
                    .member_by_idx(range_type, 0)
                    .expect("builtin range type has members");
                self.set_ty(var, low_member.ty);
                self.add_flag(var, NodeFlags::CANNOT_TAKE_ADDR);
                loop_type = ForLoop::Range;
            } else {
                match self.types.get(iter_type).clone() {
                    Type::Array { elem, .. } => {
                        let var_ty = if by_pointer {
                            self.types.pointer_to(elem)
                        } else {
                            elem
                        };
                        self.set_ty(var, var_ty);
                        loop_type = ForLoop::Array;
                    }
                    Type::Slice { elem } => {
                        let var_ty = if by_pointer {
                            self.types.pointer_to(elem)
                        } else {
                            elem
                        };
                        self.set_ty(var, var_ty);
                        loop_type = ForLoop::Slice;
                    }
                    Type::VarArgs { elem } => {
                        if by_pointer {
                            return Err(self.error(
                                error_loc,
                                CheckError::BadPointerIteration("variadic arguments"),
                            ));
                        }
                        self.set_ty(var, elem);
                        // Slices and var-args iterate identically.
                        loop_type = ForLoop::Slice;
                    }
                    Type::DynArray { elem } => {
                        let var_ty = if by_pointer {
                            self.types.pointer_to(elem)
                        } else {
                            elem
                        };
                        self.set_ty(var, var_ty);
                        loop_type = ForLoop::DynArr;
                    }
                    _ if self.types.constructed_from(iter_type)
                        == Some(self.builtins.iterator_poly) =>
                    {
                        if by_pointer {
                            return Err(self.error(
                                error_loc,
                                CheckError::BadPointerIteration("an iterator"),
                            ));
                        }
                        let elem = self.types.poly_sln_of(iter_type)[0];
                        self.set_ty(var, elem);
                        loop_type = ForLoop::Iterator;
                    }
                    _ => {
                        return Err(self.error(
                            error_loc,
                            CheckError::BadIterable(self.types.name(iter_type)),
                        ));
                    }
                }
            }

            if by_pointer {
                self.add_flag(var, NodeFlags::CANNOT_TAKE_ADDR);
            }

            if no_close && loop_type != ForLoop::Iterator {
                self.sink.warning(
                    error_loc,
                    CheckError::Message(
                        "#no_close here is meaningless as the iterable is not an iterator"
                            .to_string(),
                    ),
                );
            }

            if let NodeKind::For(def) = &mut self.ast.node_mut(fornode).kind {
                def.loop_type = Some(loop_type);
            }
            self.add_flag(fornode, NodeFlags::HAS_BEEN_CHECKED);
            trace!(?loop_type, "classified for loop");
        }

        // The body may `#remove` only when iterating an iterator.
        let iter = match &self.ast.node(fornode).kind {
            NodeKind::For(def) => def.iter,
            _ => iter,
        };
        let iter_type = self.ty_of(iter);
        let old_inside_for_iterator = self.inside_for_iterator;
        self.inside_for_iterator = iter_type
            .is_some_and(|t| self.types.constructed_from(t) == Some(self.builtins.iterator_poly));

        let result = self.check_block(body);
        self.inside_for_iterator = old_inside_for_iterator;
        result
    }

    fn add_case_to_switch_statement(
        &mut self,
        switchnode: NodeId,
        case_value: i64,
        block: NodeId,
        span: Span,
    ) -> CheckResult {
        let duplicate = match &mut self.ast.node_mut(switchnode).kind {
            NodeKind::Switch(def) => {
                def.min_case = def.min_case.min(case_value);
                def.max_case = def.max_case.max(case_value);
                if def.case_map.contains_key(&case_value) {
                    true
                } else {
                    def.case_map.insert(case_value, block);
                    false
                }
            }
            _ => false,
        };

        if duplicate {
            return Err(self.error(span, CheckError::DuplicateCase(case_value)));
        }
        Ok(())
    }

    /// Hoist `SwitchCase` statements (recursing into nested blocks) into the
    /// switch's case list, enforcing a single default.
    fn collect_switch_case_blocks(&mut self, switchnode: NodeId, root: NodeId) -> CheckResult {
        let body = match &self.ast.node(root).kind {
            NodeKind::Block(def) => def.body.clone(),
            _ => Vec::new(),
        };

        for stmt in body {
            match &self.ast.node(stmt).kind {
                NodeKind::Block(_) => {
                    self.collect_switch_case_blocks(switchnode, stmt)?;
                }
                NodeKind::SwitchCase(case) => {
                    let (is_default, block) = (case.is_default, case.block);
                    if is_default {
                        let clash = match &self.ast.node(switchnode).kind {
                            NodeKind::Switch(def) => {
                                def.default_case.is_some_and(|d| d != block)
                            }
                            _ => false,
                        };
                        if clash {
                            let span = self.span_of(stmt);
                            return Err(self.error(span, CheckError::DuplicateDefault));
                        }
                        if let NodeKind::Switch(def) = &mut self.ast.node_mut(switchnode).kind {
                            def.default_case = Some(block);
                        }
                    } else if let NodeKind::Switch(def) =
                        &mut self.ast.node_mut(switchnode).kind
                    {
                        def.cases
                            .get_or_insert_with(Vec::new)
                            .push(stmt);
                    }
                }
                _ => {
                    let span = self.span_of(stmt);
                    return Err(self.error(
                        span,
                        CheckError::Message("This statement is not allowed here".to_string()),
                    ));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn check_switch(&mut self, switchnode: NodeId) -> CheckResult {
        let span = self.span_of(switchnode);
        let (init, scrutinee, case_block) = match &self.ast.node(switchnode).kind {
            NodeKind::Switch(def) => (def.init.clone(), def.scrutinee, def.case_block),
            _ => return Ok(()),
        };

        self.check_statement_chain(&init)?;
        self.check_expression(scrutinee)?;
        let resolved_expr_type = self.resolve_expression_type(scrutinee);

        if !self.ast.node(switchnode).checked() {
            let Some(expr_type) = resolved_expr_type else {
                return Err(self.yield_now(span, "the switch expression's type"));
            };

            let kind = if self.types.is_integer(expr_type) || self.types.is_enum(expr_type) {
                SwitchKind::Integer
            } else {
                SwitchKind::UseEquals
            };
            if let NodeKind::Switch(def) = &mut self.ast.node_mut(switchnode).kind {
                def.switch_kind = Some(kind);
                def.min_case = i64::MAX;
                def.max_case = i64::MIN;
            }
        }
        self.add_flag(switchnode, NodeFlags::HAS_BEEN_CHECKED);

        // First consume the raw block to resolve macros and expand splices,
        // then hoist the cases.
        let collected = match &self.ast.node(switchnode).kind {
            NodeKind::Switch(def) => def.cases.is_some(),
            _ => true,
        };
        if !collected {
            self.check_block(case_block)?;

            if let NodeKind::Switch(def) = &mut self.ast.node_mut(switchnode).kind {
                def.cases = Some(Vec::new());
            }
            self.collect_switch_case_blocks(switchnode, case_block)?;

            // Otherwise a later return to symbol resolution would re-run
            // the raw block from a stale position.
            if let NodeKind::Block(def) = &mut self.ast.node_mut(case_block).kind {
                def.statement_idx = 0;
            }
        }

        let (cases, switch_kind) = match &self.ast.node(switchnode).kind {
            NodeKind::Switch(def) => (
                def.cases.clone().unwrap_or_default(),
                def.switch_kind.expect("switch kind classified above"),
            ),
            _ => return Ok(()),
        };
        let expr_type = self
            .ty_of(scrutinee)
            .expect("scrutinee type resolved above");

        let start = match &self.ast.node(switchnode).kind {
            NodeKind::Switch(def) => def.yield_return_index,
            _ => 0,
        };

        for i in start..cases.len() {
            let (values, block) = match &self.ast.node(cases[i]).kind {
                NodeKind::SwitchCase(case) => (case.values.clone(), case.block),
                _ => continue,
            };

            self.check_block(block)?;

            for value in values {
                self.check_expression(value)?;

                if switch_kind == SwitchKind::Integer
                    && matches!(self.ast.node(value).kind, NodeKind::RangeLiteral { .. })
                {
                    let (low, high) = match &self.ast.node(value).kind {
                        NodeKind::RangeLiteral { low, high, .. } => (*low, *high),
                        _ => continue,
                    };
                    self.resolve_expression_type(low);
                    self.resolve_expression_type(high);

                    let vspan = self.span_of(value);
                    let (Some(lower), Some(upper)) =
                        (self.integer_value_of(low), self.integer_value_of(high))
                    else {
                        return Err(self.error(
                            vspan,
                            CheckError::Message(
                                "case statement expected compile time known range".to_string(),
                            ),
                        ));
                    };

                    // Inclusive on both ends.
                    for case_value in lower..=upper {
                        self.add_case_to_switch_statement(switchnode, case_value, block, vspan)?;
                    }

                    continue;
                }

                if !self.unify(value, expr_type)? {
                    let vspan = self.span_of(value);
                    return Err(self.error(
                        vspan,
                        CheckError::Message(format!(
                            "Mismatched types in switch-case. Expected '{}', got '{}'",
                            self.types.name(expr_type),
                            self.type_name_of(value)
                        )),
                    ));
                }

                match switch_kind {
                    SwitchKind::Integer => {
                        let vspan = self.span_of(value);
                        let Some(int_value) = self.integer_value_of(value) else {
                            return Err(self.error(
                                vspan,
                                CheckError::Message(format!(
                                    "Case statement expected compile time known integer. Got '{}'",
                                    self.ast.node(value).kind.name()
                                )),
                            ));
                        };
                        self.add_case_to_switch_statement(switchnode, int_value, block, vspan)?;
                    }
                    SwitchKind::UseEquals => {
                        // Reuse the synthesized comparison on re-entry.
                        let existing = match &self.ast.node(switchnode).kind {
                            NodeKind::Switch(def) => def
                                .case_exprs
                                .iter()
                                .find(|ctb| ctb.original_value == value)
                                .map(|ctb| ctb.comparison),
                            _ => None,
                        };

                        if let Some(comparison) = existing {
                            self.check_expression(comparison)?;
                            continue;
                        }

                        let comparison = self.ast.binary(BinaryOp::Equal, scrutinee, value);
                        let vspan = self.span_of(value);
                        self.ast.node_mut(comparison).span = vspan;
                        if let NodeKind::Switch(def) = &mut self.ast.node_mut(switchnode).kind {
                            def.case_exprs.push(CaseToBlock {
                                block,
                                original_value: value,
                                comparison,
                            });
                        }
                        self.check_binaryop(comparison)?;
                    }
                }
            }

            if let NodeKind::Switch(def) = &mut self.ast.node_mut(switchnode).kind {
                def.yield_return_index += 1;
            }
        }

        let default_case = match &self.ast.node(switchnode).kind {
            NodeKind::Switch(def) => def.default_case,
            _ => None,
        };
        if let Some(default_case) = default_case {
            self.check_block(default_case)?;
        }

        Ok(())
    }

    pub(crate) fn check_remove_directive(&mut self, remove: NodeId) -> CheckResult {
        if !self.inside_for_iterator {
            let span = self.span_of(remove);
            return Err(self.error(
                span,
                CheckError::Message(
                    "#remove is only allowed in the body of a for-loop over an iterator"
                        .to_string(),
                ),
            ));
        }
        Ok(())
    }
}
