//! Compile-time directives: `#static_if`, `#insert`, `#solidify`,
//! `#export`, `#init`, `#library`.

use tracing::{debug, info};

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Progress, Resolution};
use crate::{Checker, EntityState};

impl Checker {
    /// Evaluate a `#static_if` condition and schedule the chosen side's
    /// entities. Terminates the entity.
    pub(crate) fn check_static_if(&mut self, static_if: NodeId) -> CheckResult<Progress> {
        let span = self.span_of(static_if);
        let cond = match &self.ast.node(static_if).kind {
            NodeKind::StaticIf(def) => def.cond,
            _ => return Ok(Progress::Complete),
        };

        self.expression_types_must_be_known = true;
        let result = self.check_expression(cond);
        self.expression_types_must_be_known = false;

        match result {
            Err(Interrupt::Yield) => return Err(Interrupt::Yield),
            Err(_) => {
                return Err(self.error(span, CheckError::ConditionNotComptime));
            }
            Ok(()) => {}
        }

        if !self.is_comptime(cond) {
            return Err(self.error(span, CheckError::ConditionNotComptime));
        }

        if !self.ty_of(cond).is_some_and(|t| self.types.is_bool(t)) {
            return Err(self.error(
                span,
                CheckError::Message("Expected this condition to be a boolean value".to_string()),
            ));
        }

        let resolution = self.integer_value_of(cond).is_some_and(|v| v != 0);
        self.add_flag(static_if, NodeFlags::STATIC_IF_RESOLVED);

        let entities = match &mut self.ast.node_mut(static_if).kind {
            NodeKind::StaticIf(def) => {
                def.resolution = Some(resolution);
                if resolution {
                    def.true_entities.clone()
                } else {
                    def.false_entities.clone()
                }
            }
            _ => Vec::new(),
        };

        if self.options.print_static_if_results {
            info!(
                "Static if statement at {}..{} resulted in {}",
                span.start, span.end, resolution
            );
        }

        for entity in entities {
            self.entities.insert_existing(entity);
        }

        Ok(Progress::Complete)
    }

    /// `#insert` splices the code value's block in place of itself; the
    /// clone has to pass symbol resolution before re-checking.
    pub(crate) fn check_insert_directive(&mut self, insert: NodeId) -> CheckResult {
        if self.ast.node(insert).checked() {
            return Ok(());
        }
        let span = self.span_of(insert);
        let code_expr = match &self.ast.node(insert).kind {
            NodeKind::DirectiveInsert { code_expr } => *code_expr,
            _ => return Ok(()),
        };

        self.check_expression(code_expr)?;
        if self.ty_of(code_expr).is_none() {
            if self
                .entity_state_of(code_expr)
                .is_some_and(|s| s >= EntityState::CodeGen)
            {
                return Err(self.error(
                    span,
                    CheckError::Message("Expected expression of type 'Code'".to_string()),
                ));
            }
            return Err(self.yield_now(span, "the code expression's type"));
        }

        let code_ty = self.types.basic.code;
        if !self.unify(code_expr, code_ty)? {
            return Err(self.error(
                span,
                CheckError::Message(format!(
                    "#unquote expected a value of type 'Code', got '{}'",
                    self.type_name_of(code_expr)
                )),
            ));
        }

        let code_block = self.strip_aliases(code_expr);
        let code = match &self.ast.node(code_block).kind {
            NodeKind::CodeBlock { code } => *code,
            _ => {
                return Err(self.error(
                    span,
                    CheckError::Message("Expected expression of type 'Code'".to_string()),
                ));
            }
        };

        debug!("splicing code block for #insert");
        let cloned = self.ast.clone_subtree(code);
        self.ast.replace_with_node(insert, cloned);

        Err(Interrupt::ReturnToSymres)
    }

    /// `#solidify` supplies known polymorph variables and replaces itself
    /// with the (possibly still polymorphic) resolved procedure.
    pub(crate) fn check_directive_solidify(&mut self, solid: NodeId) -> CheckResult {
        let span = self.span_of(solid);
        let def = match &self.ast.node(solid).kind {
            NodeKind::DirectiveSolidify(def) => (**def).clone(),
            _ => return Ok(()),
        };

        let mut slns = Vec::with_capacity(def.known.len());
        for (name, expr) in &def.known {
            self.check_expression(*expr)?;

            if self.ast.node(*expr).is_type_ast() {
                let Some(ty) = self.build_type_from_ast(*expr) else {
                    let espan = self.span_of(*expr);
                    return Err(self.yield_now(espan, "this polymorphic argument's type"));
                };
                slns.push(PolySolution::Type {
                    name: name.clone(),
                    ty,
                });
            } else {
                slns.push(PolySolution::Value {
                    name: name.clone(),
                    value: *expr,
                });
            }
        }

        match self.polymorphic_proc_try_solidify(def.poly_proc, &slns, span)? {
            Resolution::Yield => Err(self.yield_now(span, "the partially solidified procedure")),
            Resolution::NoMatch => Err(self.error(
                span,
                CheckError::Message(
                    "Could not solidify the polymorphic procedure with these arguments"
                        .to_string(),
                ),
            )),
            Resolution::Found(proc) => {
                let mut alias = Node::new(NodeKind::Alias { of: proc });
                alias.span = span;
                self.ast.replace(solid, alias);
                self.check_expression(solid)
            }
        }
    }

    /// `#export`, `#init` and `#library` process directives.
    pub(crate) fn check_process_directive(&mut self, directive: NodeId) -> CheckResult<Progress> {
        let span = self.span_of(directive);

        match self.ast.node(directive).kind.clone() {
            NodeKind::DirectiveExport(def) => {
                if self
                    .entity_state_of(def.target)
                    .is_some_and(|s| s <= EntityState::CheckTypes)
                {
                    return Err(self.yield_now(span, "the exported symbol to be checked"));
                }

                self.check_expression(def.name_expr)?;

                let name = match &self.ast.node(def.name_expr).kind {
                    NodeKind::StrLit { value } => value.clone(),
                    other => {
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "Expected export name to be a string literal, got '{}'",
                                other.name()
                            )),
                        ));
                    }
                };
                if let NodeKind::DirectiveExport(def) = &mut self.ast.node_mut(directive).kind {
                    def.resolved_name = Some(name);
                }
                Ok(Progress::Checked)
            }

            NodeKind::DirectiveInit(def) => {
                if !self.ast.node(directive).checked() {
                    self.check_expression(def.proc)?;

                    let proc = self.strip_aliases(def.proc);
                    if !matches!(self.ast.node(proc).kind, NodeKind::Function(_)) {
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "#init only works for functions, got '{}'",
                                self.ast.node(proc).kind.name()
                            )),
                        ));
                    }

                    let param_count = self
                        .ty_of(proc)
                        .and_then(|t| self.types.function_type(t).map(|f| f.params.len()));
                    if param_count != Some(0) {
                        return Err(self.error(
                            span,
                            CheckError::Message(
                                "#init expects a function that takes 0 arguments".to_string(),
                            ),
                        ));
                    }
                }
                self.add_flag(directive, NodeFlags::HAS_BEEN_CHECKED);

                for (i, dep) in def.dependencies.iter().enumerate() {
                    let d = self.strip_aliases(*dep);
                    if !matches!(self.ast.node(d).kind, NodeKind::DirectiveInit(_)) {
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "All dependencies of an #init must be another #init. Dependency {} was not",
                                i + 1
                            )),
                        ));
                    }

                    if self.entity_state_of(d) != Some(EntityState::Finalized) {
                        return Err(
                            self.yield_error(span, "Circular dependency between #init nodes")
                        );
                    }
                }

                let proc = self.strip_aliases(def.proc);
                self.init_procedures.push(proc);
                Ok(Progress::Complete)
            }

            NodeKind::DirectiveLibrary { name_expr, .. } => {
                let name = match &self.ast.node(name_expr).kind {
                    NodeKind::StrLit { value } => value.clone(),
                    other => {
                        return Err(self.error(
                            span,
                            CheckError::Message(format!(
                                "#library directive expected a compile-time known string for the library name. Got '{}'",
                                other.name()
                            )),
                        ));
                    }
                };

                let processed = process_escape_seqs(&name);
                if let NodeKind::DirectiveLibrary { resolved_name, .. } =
                    &mut self.ast.node_mut(directive).kind
                {
                    *resolved_name = Some(processed);
                }
                Ok(Progress::Checked)
            }

            _ => Ok(Progress::Checked),
        }
    }
}

fn process_escape_seqs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::process_escape_seqs;

    #[test]
    fn escape_sequences() {
        assert_eq!(process_escape_seqs(r"lib\n"), "lib\n");
        assert_eq!(process_escape_seqs(r"a\\b"), r"a\b");
        assert_eq!(process_escape_seqs("plain"), "plain");
        assert_eq!(process_escape_seqs(r"tail\q"), r"tail\q");
    }
}
