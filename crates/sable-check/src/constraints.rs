//! Interface constraints.
//!
//! A constraint is a parameterized predicate: each interface clause is
//! cloned with the constraint's type arguments substituted through sentinel
//! values, re-resolved, and then checked speculatively. The constraint
//! context supervises one set of constraints for a function or struct and
//! folds their outcomes into a single met/failed answer.

use tracing::debug;

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Progress};
use crate::Checker;

impl Checker {
    /// The two-phase constraint machine.
    pub(crate) fn check_constraint(&mut self, constraint: NodeId) -> CheckResult<Progress> {
        let span = self.span_of(constraint);
        let (phase, interface) = match &self.ast.node(constraint).kind {
            NodeKind::Constraint(def) => (def.phase, def.interface),
            _ => return Ok(Progress::Complete),
        };

        match phase {
            ConstraintPhase::CloningExpressions => {
                let interface = self.strip_aliases(interface);
                if matches!(self.ast.node(interface).kind, NodeKind::Symbol { .. }) {
                    return Err(Interrupt::ReturnToSymres);
                }

                let idef = match &self.ast.node(interface).kind {
                    NodeKind::Interface(def) => (**def).clone(),
                    other => {
                        let name = other.name();
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "This is not an interface. It is a '{name}'"
                            )),
                        ));
                    }
                };

                let type_args = match &self.ast.node(constraint).kind {
                    NodeKind::Constraint(def) => def.type_args.clone(),
                    _ => Vec::new(),
                };

                // Clone every clause so checking cannot disturb the
                // interface itself.
                let mut clauses = Vec::with_capacity(idef.clauses.len());
                for clause in &idef.clauses {
                    clauses.push(InterfaceClause {
                        expr: self.ast.clone_subtree(clause.expr),
                        expected_type_expr: clause
                            .expected_type_expr
                            .map(|e| self.ast.clone_subtree(e)),
                        invert_condition: clause.invert_condition,
                    });
                }

                // Fresh scope: each interface parameter gets a sentinel
                // value of the argument type plus a type alias.
                let scope = self.scopes.create(idef.scope, span);
                for (i, param) in idef.params.iter().enumerate() {
                    let Some(&type_arg) = type_args.get(i) else { break };

                    let mut sentinel = Node::new(NodeKind::ConstraintSentinel);
                    sentinel.span = span;
                    sentinel.type_node = Some(type_arg);
                    let sentinel = self.ast.alloc(sentinel);

                    let mut alias = Node::new(NodeKind::Alias { of: type_arg });
                    alias.span = span;
                    let alias = self.ast.alloc(alias);

                    self.scopes.introduce(scope, param.value_name.clone(), sentinel);
                    self.scopes.introduce(scope, param.type_name.clone(), alias);
                }

                if let NodeKind::Constraint(def) = &mut self.ast.node_mut(constraint).kind {
                    def.clauses = clauses;
                    def.scope = Some(scope);
                    def.phase = ConstraintPhase::CheckingExpressions;
                }
                if let Some(entity) = self.ast.node(constraint).entity {
                    self.entities.get_mut(entity).scope = Some(scope);
                }

                Err(Interrupt::ReturnToSymres)
            }

            ConstraintPhase::CheckingExpressions => {
                loop {
                    let clause = match &self.ast.node(constraint).kind {
                        NodeKind::Constraint(def) => {
                            if def.clause_idx >= def.clauses.len() {
                                break;
                            }
                            def.clauses[def.clause_idx].clone()
                        }
                        _ => break,
                    };

                    // Speculative: a failing clause only fails the
                    // constraint, its diagnostics never surface.
                    let mark = self.sink.begin_probe();
                    let cs = self.check_expression(clause.expr);
                    match cs {
                        Err(Interrupt::ReturnToSymres) => {
                            self.sink.end_probe(mark, true);
                            return Err(Interrupt::ReturnToSymres);
                        }
                        Err(Interrupt::Yield) => {
                            self.sink.end_probe(mark, true);
                            return Err(Interrupt::Yield);
                        }
                        Err(_) if !clause.invert_condition => {
                            self.sink.end_probe(mark, false);
                            return self.constraint_failed(constraint);
                        }
                        Ok(()) if clause.invert_condition => {
                            self.sink.end_probe(mark, false);
                            return self.constraint_failed(constraint);
                        }
                        _ => {}
                    }

                    if let Some(expected_type_expr) = clause.expected_type_expr {
                        let cs = self.check_type(expected_type_expr);
                        match cs {
                            Err(Interrupt::ReturnToSymres) => {
                                self.sink.end_probe(mark, true);
                                return Err(Interrupt::ReturnToSymres);
                            }
                            Err(Interrupt::Yield) => {
                                self.sink.end_probe(mark, true);
                                return Err(Interrupt::Yield);
                            }
                            Err(_) => {
                                self.sink.end_probe(mark, false);
                                return self.constraint_failed(constraint);
                            }
                            Ok(()) => {}
                        }

                        let Some(expected) = self.build_type_from_ast(expected_type_expr) else {
                            self.sink.end_probe(mark, true);
                            let espan = self.span_of(expected_type_expr);
                            return Err(
                                self.yield_now(espan, "the expected type expression to resolve")
                            );
                        };

                        match self.unify(clause.expr, expected) {
                            Ok(true) => {}
                            Ok(false) => {
                                if !clause.invert_condition {
                                    self.sink.end_probe(mark, false);
                                    return self.constraint_failed(constraint);
                                }
                            }
                            Err(Interrupt::Yield) => {
                                self.sink.end_probe(mark, true);
                                return Err(Interrupt::Yield);
                            }
                            Err(other) => {
                                self.sink.end_probe(mark, false);
                                let _ = other;
                                return self.constraint_failed(constraint);
                            }
                        }
                    }

                    self.sink.end_probe(mark, false);
                    if let NodeKind::Constraint(def) = &mut self.ast.node_mut(constraint).kind {
                        def.clause_idx += 1;
                    }
                }

                self.report_constraint_status(constraint, ConstraintCheckStatus::Success);
                Ok(Progress::Complete)
            }
        }
    }

    fn constraint_failed(&mut self, constraint: NodeId) -> CheckResult<Progress> {
        debug!("constraint clause failed");
        self.report_constraint_status(constraint, ConstraintCheckStatus::Failed);
        Err(Interrupt::Failed)
    }

    fn report_constraint_status(&mut self, constraint: NodeId, status: ConstraintCheckStatus) {
        let report = match &self.ast.node(constraint).kind {
            NodeKind::Constraint(def) => def.report,
            _ => None,
        };
        let Some((owner, idx)) = report else { return };
        if let Some(cc) = self.constraint_context_mut(owner) {
            if let Some(checks) = cc.checks.as_mut() {
                if let Some(slot) = checks.get_mut(idx) {
                    *slot = status;
                }
            }
        }
    }

    /// Supervisor for the constraints of one function or struct: registers
    /// them as entities on first entry, then folds their statuses.
    pub(crate) fn check_constraint_context(
        &mut self,
        owner: NodeId,
        scope: Option<ScopeId>,
        pos: Span,
    ) -> CheckResult {
        let cc = match self.constraint_context(owner) {
            Some(cc) => cc.clone(),
            None => return Ok(()),
        };

        if let Some(checks) = &cc.checks {
            if cc.constraints_met {
                return Ok(());
            }

            for (i, check) in checks.iter().enumerate() {
                match check {
                    ConstraintCheckStatus::Failed => {
                        if cc.produce_errors {
                            let constraint = cc.constraints[i];
                            let description = self.describe_constraint(constraint);
                            let cspan = self.span_of(constraint);
                            self.sink
                                .error(cspan, CheckError::ConstraintFailed(description));
                            self.sink.error(
                                cspan,
                                CheckError::Message(
                                    "Here is where the interface was used".to_string(),
                                ),
                            );
                            self.sink.error(
                                pos,
                                CheckError::Message(
                                    "Here is the code that caused this constraint to be checked"
                                        .to_string(),
                                ),
                            );
                            return Err(Interrupt::Error);
                        }
                        // Errors are suppressed, but the node still has to
                        // reach a completed state.
                        return Err(Interrupt::Failed);
                    }
                    ConstraintCheckStatus::Queued => {
                        return Err(self.yield_now(pos, "constraints to be checked"));
                    }
                    ConstraintCheckStatus::Success => {}
                }
            }

            if let Some(cc) = self.constraint_context_mut(owner) {
                cc.constraints_met = true;
            }
            Ok(())
        } else {
            // First entry: queue every constraint as its own entity.
            let count = cc.constraints.len();
            if let Some(cc) = self.constraint_context_mut(owner) {
                cc.checks = Some(vec![ConstraintCheckStatus::Queued; count]);
            }

            for (i, &constraint) in cc.constraints.iter().enumerate() {
                if let NodeKind::Constraint(def) = &mut self.ast.node_mut(constraint).kind {
                    def.report = Some((owner, i));
                    def.phase = ConstraintPhase::CloningExpressions;
                }
                self.add_entities_for_node(constraint, scope);
            }

            Err(self.yield_now(pos, "constraints to be checked"))
        }
    }

    /// "x is of type 'X', y is of type 'Y'" for the failure diagnostic.
    fn describe_constraint(&mut self, constraint: NodeId) -> String {
        let (interface, type_args) = match &self.ast.node(constraint).kind {
            NodeKind::Constraint(def) => (def.interface, def.type_args.clone()),
            _ => return String::new(),
        };

        let interface = self.strip_aliases(interface);
        let params = match &self.ast.node(interface).kind {
            NodeKind::Interface(def) => def.params.clone(),
            _ => Vec::new(),
        };

        let mut parts = Vec::new();
        for (i, arg) in type_args.iter().enumerate() {
            let name = params
                .get(i)
                .map(|p| p.value_name.clone())
                .unwrap_or_else(|| format!("${i}"));
            let ty = self
                .build_type_from_ast(*arg)
                .map(|t| self.types.name(t))
                .unwrap_or_else(|| "?".to_string());
            parts.push(format!("{name} is of type '{ty}'"));
        }
        parts.join(", ")
    }
}
