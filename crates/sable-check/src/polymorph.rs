//! Polymorphic procedures: structural solution finding, solidification
//! into concrete instances, and the iterative polymorph query machine.

use tracing::debug;

use sable_ast::*;

use crate::errors::CheckError;
use crate::status::{CheckResult, Interrupt, Progress, Resolution, TypeMatch};
use crate::types::Type;
use crate::{Checker, EntityKind, EntityState};

/// Outcome of solving one polymorphic parameter.
pub(crate) enum PolySlnResult {
    Solved(TypeId),
    Yield,
    Failed,
}

impl Checker {
    /// Match a polymorphic type pattern against an actual type, extracting
    /// the binding for `var`.
    pub(crate) fn poly_match(
        &self,
        pattern: NodeId,
        actual: TypeId,
        var: &str,
    ) -> Option<TypeId> {
        match &self.ast.node(pattern).kind {
            NodeKind::PolyVar { name } if name == var => Some(actual),
            NodeKind::PolyVar { .. } => None,

            NodeKind::PointerType { elem } => {
                let inner = self.types.pointer_elem(actual)?;
                self.poly_match(*elem, inner, var)
            }
            NodeKind::SliceType { elem } => match self.types.get(actual) {
                Type::Slice { elem: inner } => self.poly_match(*elem, *inner, var),
                _ => None,
            },
            NodeKind::DynArrType { elem } => match self.types.get(actual) {
                Type::DynArray { elem: inner } => self.poly_match(*elem, *inner, var),
                _ => None,
            },
            NodeKind::VarArgType { elem } => match self.types.get(actual) {
                Type::VarArgs { elem: inner } => self.poly_match(*elem, *inner, var),
                _ => None,
            },
            NodeKind::ArrayType { elem, .. } => match self.types.get(actual) {
                Type::Array { elem: inner, .. } => self.poly_match(*elem, *inner, var),
                _ => None,
            },
            NodeKind::PolyCallType { callee, params } => {
                let constructed = self.types.constructed_from(actual)?;
                if self.strip_aliases(*callee) != constructed {
                    return None;
                }
                let sln = self.types.poly_sln_of(actual);
                for (pattern, &arg) in params.iter().zip(sln.iter()) {
                    if let Some(found) = self.poly_match(*pattern, arg, var) {
                        return Some(found);
                    }
                }
                None
            }
            NodeKind::TypeAlias { to } => self.poly_match(*to, actual, var),
            _ => None,
        }
    }

    /// Solve one polymorphic parameter from the given argument types.
    pub(crate) fn find_polymorphic_sln(
        &mut self,
        param: &PolyParam,
        given: &[Option<TypeId>],
    ) -> PolySlnResult {
        match &param.kind {
            PolyParamKind::ByType { param_idx, pattern } => {
                let Some(slot) = given.get(*param_idx) else {
                    return PolySlnResult::Failed;
                };
                let Some(actual) = slot else {
                    return PolySlnResult::Yield;
                };
                match self.poly_match(*pattern, *actual, &param.name) {
                    Some(ty) => PolySlnResult::Solved(ty),
                    None => PolySlnResult::Failed,
                }
            }
            PolyParamKind::ByValue { .. } => PolySlnResult::Failed,
        }
    }

    /// Replace every `$name` in the subtree with the solved type.
    pub(crate) fn substitute_poly_vars(&mut self, root: NodeId, name: &str, ty: TypeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if matches!(&self.ast.node(id).kind, NodeKind::PolyVar { name: n } if n == name) {
                let span = self.span_of(id);
                let mut replacement = Node::new(NodeKind::BasicTypeRef { ty });
                replacement.span = span;
                self.ast.replace(id, replacement);
                continue;
            }
            stack.extend(self.ast.children(id));
        }
    }

    /// Probe whether a polymorphic candidate could take these arguments.
    pub(crate) fn args_given_types(&self, args: &CallArgs) -> Vec<Option<TypeId>> {
        args.values
            .iter()
            .map(|slot| {
                slot.map(|id| match &self.ast.node(id).kind {
                    NodeKind::Argument { value } => self.ty_of(*value),
                    _ => self.ty_of(id),
                })
                .flatten()
            })
            .collect()
    }

    pub(crate) fn poly_proc_could_match(
        &mut self,
        pp: NodeId,
        args: &CallArgs,
    ) -> CheckResult<TypeMatch> {
        let poly_params = match &self.ast.node(pp).kind {
            NodeKind::PolyProc(def) => def.poly_params.clone(),
            _ => return Ok(TypeMatch::Failed),
        };
        let given = self.args_given_types(args);

        for param in &poly_params {
            match self.find_polymorphic_sln(param, &given) {
                PolySlnResult::Solved(_) => {}
                PolySlnResult::Yield => return Ok(TypeMatch::Yield),
                PolySlnResult::Failed => return Ok(TypeMatch::Failed),
            }
        }
        Ok(TypeMatch::Success)
    }

    /// Resolve a polymorphic procedure by call arguments: solve every
    /// variable, then reuse or create the concrete instance.
    pub(crate) fn polymorphic_proc_lookup(
        &mut self,
        pp: NodeId,
        args: &CallArgs,
        span: Span,
    ) -> CheckResult<Resolution> {
        let poly_params = match &self.ast.node(pp).kind {
            NodeKind::PolyProc(def) => def.poly_params.clone(),
            _ => return Ok(Resolution::NoMatch),
        };

        // Commit argument expression types (numeric literals take their
        // default types) before solving.
        let values: Vec<NodeId> = args.values.iter().flatten().copied().collect();
        for value in values {
            let value = match &self.ast.node(value).kind {
                NodeKind::Argument { value } => *value,
                _ => value,
            };
            self.resolve_expression_type(value);
        }

        let given = self.args_given_types(args);
        let mut slns = Vec::with_capacity(poly_params.len());
        for param in &poly_params {
            match self.find_polymorphic_sln(param, &given) {
                PolySlnResult::Solved(ty) => slns.push(PolySolution::Type {
                    name: param.name.clone(),
                    ty,
                }),
                PolySlnResult::Yield => return Ok(Resolution::Yield),
                PolySlnResult::Failed => return Ok(Resolution::NoMatch),
            }
        }

        Ok(Resolution::Found(self.solidify_poly_proc(pp, &slns, span)))
    }

    /// Solidify with partially or fully known variables (`#solidify`).
    pub(crate) fn polymorphic_proc_try_solidify(
        &mut self,
        pp: NodeId,
        slns: &[PolySolution],
        span: Span,
    ) -> CheckResult<Resolution> {
        let poly_params = match &self.ast.node(pp).kind {
            NodeKind::PolyProc(def) => def.poly_params.clone(),
            _ => return Ok(Resolution::NoMatch),
        };

        let all_known = poly_params
            .iter()
            .all(|p| slns.iter().any(|s| s.name() == p.name));
        if !all_known {
            // A partial solidification stays polymorphic: remember the
            // known solutions and hand back the still-poly proc.
            if let NodeKind::PolyProc(def) = &mut self.ast.node_mut(pp).kind {
                for sln in slns {
                    if !def.known_slns.iter().any(|s| s.name() == sln.name()) {
                        def.known_slns.push(sln.clone());
                    }
                }
            }
            return Ok(Resolution::Found(pp));
        }

        Ok(Resolution::Found(self.solidify_poly_proc(pp, slns, span)))
    }

    /// Create (or reuse) the concrete instance for a full solution set.
    fn solidify_poly_proc(&mut self, pp: NodeId, slns: &[PolySolution], span: Span) -> NodeId {
        let (func, poly_params) = match &self.ast.node(pp).kind {
            NodeKind::PolyProc(def) => (def.func.clone(), def.poly_params.clone()),
            _ => return pp,
        };

        let mut key = Vec::new();
        let mut cacheable = true;
        for param in &poly_params {
            match slns.iter().find(|s| s.name() == param.name) {
                Some(PolySolution::Type { ty, .. }) => key.push(*ty),
                _ => cacheable = false,
            }
        }

        if cacheable {
            let cached = match &self.ast.node(pp).kind {
                NodeKind::PolyProc(def) => def
                    .instances
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, inst)| *inst),
                _ => None,
            };
            if let Some(inst) = cached {
                return inst;
            }
        }

        // Clone the whole procedure, then substitute the solved variables
        // through its parameter types, return type and body.
        let template = self.ast.alloc(Node::new(NodeKind::Function(Box::new(func))));
        let inst = self.ast.clone_subtree(template);
        self.ast.node_mut(inst).span = span;

        for sln in slns {
            if let PolySolution::Type { name, ty } = sln {
                self.substitute_poly_vars(inst, name, *ty);
            }
        }

        let type_names: Vec<String> = key.iter().map(|t| self.types.name(*t)).collect();
        if let NodeKind::Function(def) = &mut self.ast.node_mut(inst).kind {
            if !type_names.is_empty() {
                def.name = format!("{}({})", def.name, type_names.join(", "));
            }
            def.generated_from = Some(span);
        }

        let header = self
            .entities
            .insert_with_state(EntityKind::FunctionHeader(inst), None, EntityState::CheckTypes);
        let body = self
            .entities
            .insert_with_state(EntityKind::Function(inst), None, EntityState::CheckTypes);
        self.ast.node_mut(inst).entity = Some(header);
        if let NodeKind::Function(def) = &mut self.ast.node_mut(inst).kind {
            def.entity_header = Some(header);
            def.entity_body = Some(body);
        }
        self.round_progress = true;

        if cacheable {
            if let NodeKind::PolyProc(def) = &mut self.ast.node_mut(pp).kind {
                def.instances.push((key, inst));
            }
        }

        debug!("solidified polymorphic procedure");
        inst
    }

    /// The iterative polymorph query: trial-check the header, then try to
    /// solve each remaining variable, ending when everything is solved or
    /// no further progress is possible.
    pub(crate) fn check_polyquery(&mut self, query: NodeId) -> CheckResult<Progress> {
        let span = self.span_of(query);
        let def = match &self.ast.node(query).kind {
            NodeKind::PolyQuery(def) => (**def).clone(),
            _ => return Ok(Progress::Complete),
        };

        let header_check = self.check_temp_function_header(def.function_header);
        if let Err(Interrupt::ReturnToSymres) = header_check {
            return Err(Interrupt::ReturnToSymres);
        }

        let poly_params = match &self.ast.node(def.proc).kind {
            NodeKind::PolyProc(p) => p.poly_params.clone(),
            _ => return Ok(Progress::Complete),
        };
        let known_slns = match &self.ast.node(def.proc).kind {
            NodeKind::PolyProc(p) => p.known_slns.clone(),
            _ => Vec::new(),
        };

        let mut solved_something = false;
        let mut solved_count = 0usize;

        for param in &poly_params {
            let already = match &self.ast.node(query).kind {
                NodeKind::PolyQuery(q) => q.slns.iter().any(|s| s.name() == param.name),
                _ => false,
            };
            if already {
                solved_count += 1;
                continue;
            }

            let sln = if let Some(known) =
                known_slns.iter().find(|s| s.name() == param.name)
            {
                Some(known.clone())
            } else {
                match self.find_polymorphic_sln(param, &def.given) {
                    PolySlnResult::Solved(ty) => Some(PolySolution::Type {
                        name: param.name.clone(),
                        ty,
                    }),
                    // A variable unsolvable this pass (information missing
                    // or contradictory) continues only when another
                    // variable made progress or symbol resolution already
                    // succeeded; otherwise the query ends as failed.
                    PolySlnResult::Yield | PolySlnResult::Failed => {
                        if def.successful_symres || solved_something {
                            continue;
                        }

                        if def.error_on_fail || self.cycle_detected {
                            self.sink.error(
                                span,
                                CheckError::PolymorphSolveFailed(param.name.clone()),
                            );
                            if let Some(error_loc) = def.error_loc {
                                self.sink.error(
                                    error_loc,
                                    CheckError::Message(
                                        "Here is where the call is located".to_string(),
                                    ),
                                );
                            }
                        }
                        return Err(Interrupt::Failed);
                    }
                }
            };

            if let Some(sln) = sln {
                if let PolySolution::Type { name, ty } = &sln {
                    let (name, ty) = (name.clone(), *ty);
                    self.substitute_poly_vars(def.function_header, &name, ty);
                }
                if let NodeKind::PolyQuery(q) = &mut self.ast.node_mut(query).kind {
                    q.slns.push(sln);
                }
                solved_something = true;
                solved_count += 1;
            }
        }

        if solved_count != poly_params.len() {
            if solved_something || def.successful_symres {
                return Err(Interrupt::ReturnToSymres);
            }
            return Err(Interrupt::Failed);
        }

        Ok(Progress::Complete)
    }
}
