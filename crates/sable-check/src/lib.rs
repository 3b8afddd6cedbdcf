//! Sable semantic analysis.
//!
//! The checker walks partially-resolved AST entities, verifies type
//! correctness, infers missing types, resolves overloads and polymorphic
//! procedures, expands macros and compile-time conditionals, enforces
//! interface constraints, and marks each entity ready for code generation.
//!
//! Checking is cooperative: one entity is checked at a time, and a check
//! that needs information another entity has not produced yet yields back
//! to the scheduler instead of blocking. Forward references and cycles
//! between entities resolve through repeated rounds; a round that makes no
//! progress flips `cycle_detected`, after which yields become hard errors
//! at the stuck site.

mod call;
mod checker_decl;
mod checker_expr;
mod checker_stmt;
mod comptime;
mod constraints;
mod directives;
mod entities;
mod errors;
mod operators;
mod polymorph;
mod render;
mod scope;
mod status;
mod types;
mod unify;

use std::collections::HashMap;

use tracing::{debug, trace};

use sable_ast::*;

pub use entities::{Entity, EntityHeap, EntityKind, EntityState};
pub use errors::{CheckError, Diagnostic, DiagnosticSink, Severity};
pub use render::DiagnosticRenderer;
pub use status::{CheckResult, CheckStatus, Interrupt, Progress, Resolution, TypeMatch};
pub use scope::ScopeArena;
pub use types::{
    edit_distance, find_similar_name, BasicFlags, BasicKind, EnumType, FunctionType,
    StructMember, StructStatus, StructType, Type, TypeStore,
};

/// Configuration flags the checker observes.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Print the outcome of every `#static_if` as it resolves.
    pub print_static_if_results: bool,
    /// Reject `#file_contents` for this compilation.
    pub no_file_contents: bool,
}

/// Handles to the builtin constructs the checker synthesizes against.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    /// The `range` struct: `low`, `high`, and defaulted `step`.
    pub range_type: TypeId,
    /// The polymorphic `Iterator` struct declaration.
    pub iterator_poly: NodeId,
    /// The `CallSite` struct filled in for `#callsite` arguments.
    pub callsite_type: TypeId,
    /// Element type given to untyped var-args parameters.
    pub vararg_any: TypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckingLevel {
    Statement,
    Expression,
}

/// Where the currently-expected return type lives, so resolving an
/// auto-return writes through to its owner.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReturnSlot {
    FunctionType(TypeId),
    Node(NodeId),
}

/// Summary returned by [`Checker::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub rounds: usize,
    pub code_gen: usize,
    pub finalized: usize,
    pub failed: usize,
    pub errors: usize,
}

pub struct Checker {
    pub ast: AstArena,
    pub types: TypeStore,
    pub scopes: ScopeArena,
    pub entities: EntityHeap,
    pub sink: DiagnosticSink,
    pub options: CheckOptions,
    pub builtins: Builtins,
    pub cycle_detected: bool,

    /// Procedures registered with `#init`, in dependency order.
    pub init_procedures: Vec<NodeId>,

    operator_overloads: HashMap<BinaryOp, Vec<NodeId>>,
    iterator_cache: HashMap<TypeId, TypeId>,

    // Explicit checker context (spec'd global state, made fields).
    pub(crate) expected_return: Option<ReturnSlot>,
    pub(crate) inside_for_iterator: bool,
    pub(crate) expression_types_must_be_known: bool,
    pub(crate) all_checks_are_final: bool,
    pub(crate) checking_level: CheckingLevel,

    round_progress: bool,
}

impl Checker {
    pub fn new() -> Self {
        let mut ast = AstArena::new();
        let mut types = TypeStore::new();
        let builtins = Self::make_builtins(&mut ast, &mut types);

        Checker {
            ast,
            types,
            scopes: ScopeArena::new(),
            entities: EntityHeap::new(),
            sink: DiagnosticSink::new(),
            options: CheckOptions::default(),
            builtins,
            cycle_detected: false,
            init_procedures: Vec::new(),
            operator_overloads: HashMap::new(),
            iterator_cache: HashMap::new(),
            expected_return: None,
            inside_for_iterator: false,
            expression_types_must_be_known: false,
            all_checks_are_final: true,
            checking_level: CheckingLevel::Statement,
            round_progress: false,
        }
    }

    fn make_builtins(ast: &mut AstArena, types: &mut TypeStore) -> Builtins {
        let i32_ = types.basic.i32_;
        let u32_ = types.basic.u32_;
        let str_ = types.basic.str_;

        let mut step_default = Node::new(NodeKind::NumLit {
            value: NumValue::Int(1),
        });
        step_default.ty = Some(i32_);
        step_default.flags |= NodeFlags::COMPTIME | NodeFlags::HAS_BEEN_CHECKED;
        let step_default = ast.alloc(step_default);

        let member = |name: &str, ty, idx, offset, initial| StructMember {
            name: name.to_string(),
            ty,
            idx,
            offset,
            initial_value: initial,
            used: false,
            use_through_pointer_index: None,
        };

        let range_type = types.new_struct(StructType {
            name: "range".to_string(),
            status: StructStatus::UsesDone,
            members: vec![
                member("low", i32_, 0, 0, None),
                member("high", i32_, 1, 4, None),
                member("step", i32_, 2, 8, Some(step_default)),
            ],
            source_member_count: 3,
            polymorph_of: None,
            poly_sln: Vec::new(),
            ast_node: None,
            scope: None,
        });

        let callsite_type = types.new_struct(StructType {
            name: "CallSite".to_string(),
            status: StructStatus::UsesDone,
            members: vec![
                member("filename", str_, 0, 0, None),
                member("line", u32_, 1, 16, None),
                member("column", u32_, 2, 20, None),
            ],
            source_member_count: 3,
            polymorph_of: None,
            poly_sln: Vec::new(),
            ast_node: None,
            scope: None,
        });

        let iterator_poly = ast.alloc(Node::new(NodeKind::PolyStructDecl(Box::new(
            PolyStructDef {
                name: "Iterator".to_string(),
                poly_params: vec!["T".to_string()],
            },
        ))));

        Builtins {
            range_type,
            iterator_poly,
            callsite_type,
            vararg_any: types.basic.rawptr,
        }
    }

    // ----- status helpers -----------------------------------------------

    /// Yield, unless the scheduler has flagged a stalled cycle, in which
    /// case the wait becomes a hard error so the user sees the stuck site.
    pub(crate) fn yield_now(&mut self, span: Span, waiting_on: &str) -> Interrupt {
        if self.cycle_detected {
            self.sink
                .error(span, CheckError::WaitingOn(waiting_on.to_string()));
            Interrupt::Error
        } else {
            trace!(waiting_on, "yield");
            Interrupt::Yield
        }
    }

    /// Like [`Checker::yield_now`], but the cycle-time diagnostic is the
    /// message itself rather than a "waiting on" wrapper.
    pub(crate) fn yield_error(&mut self, span: Span, msg: &str) -> Interrupt {
        if self.cycle_detected {
            self.sink.error(span, CheckError::Message(msg.to_string()));
            Interrupt::Error
        } else {
            trace!(msg, "yield");
            Interrupt::Yield
        }
    }

    pub(crate) fn error(&mut self, span: Span, error: CheckError) -> Interrupt {
        self.sink.error(span, error);
        Interrupt::Error
    }

    // ----- node helpers -------------------------------------------------

    pub(crate) fn ty_of(&self, id: NodeId) -> Option<TypeId> {
        self.ast.node(id).ty
    }

    pub(crate) fn set_ty(&mut self, id: NodeId, ty: TypeId) {
        self.ast.node_mut(id).ty = Some(ty);
    }

    pub(crate) fn span_of(&self, id: NodeId) -> Span {
        self.ast.node(id).span
    }

    pub(crate) fn has_flag(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.ast.node(id).flags.contains(flag)
    }

    pub(crate) fn add_flag(&mut self, id: NodeId, flag: NodeFlags) {
        self.ast.node_mut(id).flags |= flag;
    }

    pub(crate) fn is_comptime(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::COMPTIME)
    }

    /// The printable type name of an expression, for diagnostics.
    pub(crate) fn type_name_of(&self, id: NodeId) -> String {
        match self.ty_of(id) {
            Some(ty) => self.types.name(ty),
            None => "unknown".to_string(),
        }
    }

    pub(crate) fn entity_state_of(&self, node: NodeId) -> Option<EntityState> {
        self.ast
            .node(node)
            .entity
            .map(|eid| self.entities.state(eid))
    }

    /// Follow alias nodes to the aliased value.
    pub(crate) fn strip_aliases(&self, mut id: NodeId) -> NodeId {
        while let NodeKind::Alias { of } = &self.ast.node(id).kind {
            id = *of;
        }
        id
    }

    // ----- type construction --------------------------------------------

    /// Build a semantic type from a type AST node. `None` means the type
    /// cannot be constructed yet (the caller yields).
    pub(crate) fn build_type_from_ast(&mut self, id: NodeId) -> Option<TypeId> {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::BasicTypeRef { ty } => Some(ty),
            NodeKind::TypeAlias { to } => self.build_type_from_ast(to),
            NodeKind::Alias { of } => self.build_type_from_ast(of),
            NodeKind::PointerType { elem } => {
                let elem = self.build_type_from_ast(elem)?;
                Some(self.types.pointer_to(elem))
            }
            NodeKind::SliceType { elem } => {
                let elem = self.build_type_from_ast(elem)?;
                Some(self.types.slice_of(elem))
            }
            NodeKind::DynArrType { elem } => {
                let elem = self.build_type_from_ast(elem)?;
                Some(self.types.dyn_array_of(elem))
            }
            NodeKind::VarArgType { elem } => {
                let elem = self.build_type_from_ast(elem)?;
                Some(self.types.varargs_of(elem))
            }
            NodeKind::ArrayType { count_expr, elem } => {
                let count = match count_expr {
                    Some(c) => u32::try_from(self.integer_value_of(c)?).ok()?,
                    None => return None,
                };
                let elem = self.build_type_from_ast(elem)?;
                Some(self.types.array_of(elem, count))
            }
            NodeKind::FunctionType { params, ret } => {
                let mut param_types = Vec::with_capacity(params.len());
                for p in params {
                    param_types.push(self.build_type_from_ast(p)?);
                }
                let ret = self.build_type_from_ast(ret)?;
                Some(self.types.function(param_types, ret))
            }
            NodeKind::CompoundType { types } => {
                let mut parts = Vec::with_capacity(types.len());
                for t in types {
                    parts.push(self.build_type_from_ast(t)?);
                }
                Some(self.types.compound_of(parts))
            }
            NodeKind::TypeOf { resolved, .. } => resolved,
            NodeKind::StructDecl(def) => {
                if !def.ready_to_build_type {
                    return None;
                }
                if let Some(pending) = def.pending_type {
                    return Some(pending);
                }
                self.build_pending_struct_type(id)
            }
            NodeKind::PolyCallType { callee, params } => {
                let callee = self.strip_aliases(callee);
                match self.ast.node(callee).kind {
                    NodeKind::PolyStructDecl(_) => {
                        let mut args = Vec::with_capacity(params.len());
                        for p in params {
                            args.push(self.build_type_from_ast(p)?);
                        }
                        Some(self.instantiate_poly_struct(callee, &args))
                    }
                    _ => None,
                }
            }
            // An unsolved polymorphic variable cannot be constructed.
            NodeKind::PolyVar { .. } => None,
            _ => None,
        }
    }

    /// Construct the pending struct type for a ready struct declaration.
    fn build_pending_struct_type(&mut self, decl: NodeId) -> Option<TypeId> {
        let def = match &self.ast.node(decl).kind {
            NodeKind::StructDecl(def) => (**def).clone(),
            _ => return None,
        };

        let mut members = Vec::with_capacity(def.members.len());
        let mut offset = 0u32;
        for (idx, m) in def.members.iter().enumerate() {
            let ty = m.ty?;
            let align = self.types.alignment_of(ty).max(1);
            offset = offset.div_ceil(align) * align;
            members.push(StructMember {
                name: m.name.clone(),
                ty,
                idx,
                offset,
                initial_value: m.initial_value,
                used: m.used,
                use_through_pointer_index: None,
            });
            offset += self.types.size_of(ty);
        }

        let source_member_count = members.len();
        let ty = self.types.new_struct(StructType {
            name: def.name.clone(),
            status: StructStatus::Pending,
            members,
            source_member_count,
            polymorph_of: None,
            poly_sln: Vec::new(),
            ast_node: Some(decl),
            scope: def.scope,
        });

        if let NodeKind::StructDecl(def) = &mut self.ast.node_mut(decl).kind {
            def.pending_type = Some(ty);
            def.pending_type_is_valid = true;
        }
        Some(ty)
    }

    /// Instantiate a polymorphic struct (used for `Iterator(T)`).
    pub fn instantiate_poly_struct(&mut self, decl: NodeId, args: &[TypeId]) -> TypeId {
        if args.len() == 1 && decl == self.builtins.iterator_poly {
            return self.iterator_of(args[0]);
        }

        let name = match &self.ast.node(decl).kind {
            NodeKind::PolyStructDecl(def) => def.name.clone(),
            _ => "poly".to_string(),
        };
        self.types.new_struct(StructType {
            name,
            status: StructStatus::UsesDone,
            members: Vec::new(),
            source_member_count: 0,
            polymorph_of: Some(decl),
            poly_sln: args.to_vec(),
            ast_node: Some(decl),
            scope: None,
        })
    }

    /// `Iterator(elem)` with instance caching.
    pub fn iterator_of(&mut self, elem: TypeId) -> TypeId {
        if let Some(&ty) = self.iterator_cache.get(&elem) {
            return ty;
        }
        let iterator_poly = self.builtins.iterator_poly;
        let ty = self.types.new_struct(StructType {
            name: "Iterator".to_string(),
            status: StructStatus::UsesDone,
            members: Vec::new(),
            source_member_count: 0,
            polymorph_of: Some(iterator_poly),
            poly_sln: vec![elem],
            ast_node: Some(iterator_poly),
            scope: None,
        });
        self.iterator_cache.insert(elem, ty);
        ty
    }

    /// If the node has an unresolved type AST but no semantic type yet,
    /// check the type AST and build the type.
    pub(crate) fn fill_in_type(&mut self, id: NodeId) -> CheckResult {
        if self.ty_of(id).is_some() {
            return Ok(());
        }
        let Some(type_node) = self.ast.node(id).type_node else {
            return Ok(());
        };
        self.check_type(type_node)?;
        if let Some(ty) = self.build_type_from_ast(type_node) {
            self.set_ty(id, ty);
        }
        Ok(())
    }

    /// Commit an expression to a concrete type: unsized numeric literals
    /// default (int → i32 when it fits, else i64; float → f64), compounds
    /// build their tuple type. Returns the committed type.
    pub(crate) fn resolve_expression_type(&mut self, id: NodeId) -> Option<TypeId> {
        let node = self.ast.node(id);
        match &node.kind {
            NodeKind::NumLit { value } => {
                let value = *value;
                let ty = node.ty;
                if ty.is_none() || ty.is_some_and(|t| self.types.is_unsized_literal(t)) {
                    let committed = match value {
                        NumValue::Int(v) => {
                            if i32::try_from(v).is_ok() {
                                self.types.basic.i32_
                            } else {
                                self.types.basic.i64_
                            }
                        }
                        NumValue::Float(_) => self.types.basic.f64_,
                        NumValue::Bool(_) => self.types.basic.bool_,
                    };
                    self.set_ty(id, committed);
                }
                self.ty_of(id)
            }
            NodeKind::Compound { exprs } => {
                let exprs = exprs.clone();
                let mut parts = Vec::with_capacity(exprs.len());
                for e in exprs {
                    parts.push(self.resolve_expression_type(e)?);
                }
                let ty = self.types.compound_of(parts);
                self.set_ty(id, ty);
                Some(ty)
            }
            _ => node.ty,
        }
    }

    /// The compile-time integer value of an expression, when it has one.
    pub(crate) fn integer_value_of(&self, id: NodeId) -> Option<i64> {
        match &self.ast.node(id).kind {
            NodeKind::NumLit { value: NumValue::Int(v) } => Some(*v),
            NodeKind::NumLit { value: NumValue::Bool(b) } => Some(*b as i64),
            NodeKind::EnumValue { value, .. } => value.and_then(|v| self.integer_value_of(v)),
            NodeKind::Alias { of } => self.integer_value_of(*of),
            _ => None,
        }
    }

    // ----- expected-return slot -----------------------------------------

    pub(crate) fn expected_return_type(&self) -> Option<TypeId> {
        match self.expected_return? {
            ReturnSlot::FunctionType(fid) => self.types.function_type(fid).map(|f| f.return_type),
            ReturnSlot::Node(id) => self.ty_of(id),
        }
    }

    pub(crate) fn set_expected_return_type(&mut self, ty: TypeId) {
        match self.expected_return {
            Some(ReturnSlot::FunctionType(fid)) => self.types.set_function_return(fid, ty),
            Some(ReturnSlot::Node(id)) => self.set_ty(id, ty),
            None => {}
        }
    }

    // ----- operator overload registry -----------------------------------

    pub fn add_operator_overload(&mut self, op: BinaryOp, overload: NodeId) {
        self.operator_overloads.entry(op).or_default().push(overload);
    }

    pub(crate) fn operator_overloads_for(&self, op: BinaryOp) -> Vec<NodeId> {
        self.operator_overloads.get(&op).cloned().unwrap_or_default()
    }

    pub(crate) fn has_operator_overloads(&self, op: BinaryOp) -> bool {
        self.operator_overloads
            .get(&op)
            .is_some_and(|v| !v.is_empty())
    }

    // ----- entities ------------------------------------------------------

    /// Wrap a node in an entity appropriate for its kind and schedule it.
    pub fn add_entities_for_node(&mut self, node: NodeId, scope: Option<ScopeId>) -> EntityId {
        let kind = match self.ast.node(node).kind {
            NodeKind::Constraint(_) => EntityKind::ConstraintCheck(node),
            NodeKind::PolyQuery(_) => EntityKind::PolymorphQuery(node),
            NodeKind::Function(_) => EntityKind::FunctionHeader(node),
            NodeKind::StructDecl(_) => EntityKind::StructType(node),
            _ => EntityKind::Expression(node),
        };
        let id = self
            .entities
            .insert_with_state(kind, scope, EntityState::CheckTypes);
        self.ast.node_mut(node).entity = Some(id);
        self.round_progress = true;
        id
    }

    /// Create a parked entity for a static-if branch item.
    pub fn park_entity_for_node(&mut self, kind: EntityKind, scope: Option<ScopeId>) -> EntityId {
        let node = kind.node();
        let id = self.entities.park(kind, scope);
        self.ast.node_mut(node).entity = Some(id);
        id
    }

    // ----- entity dispatch ----------------------------------------------

    /// Check one entity and map the outcome onto its state.
    pub fn check_entity(&mut self, id: EntityId) -> CheckStatus {
        let entity = self.entities.get(id).clone();
        debug!(?entity.kind, ?entity.state, "check entity");

        let result: CheckResult<Progress> = match entity.kind {
            EntityKind::FunctionHeader(node) => {
                self.check_function_header(node).map(|_| Progress::Checked)
            }
            EntityKind::TempFunctionHeader(node) => self.check_temp_function_header(node),
            EntityKind::Function(node) => self.check_function(node).map(|_| Progress::Checked),
            EntityKind::OverloadedFunction(node) => self
                .check_overloaded_function(node)
                .map(|_| Progress::Checked),
            EntityKind::Global(node) => self.check_global(node).map(|_| Progress::Checked),
            EntityKind::StructType(node) => self.check_struct(node).map(|_| Progress::Checked),
            EntityKind::StructMemberDefaults(node) => {
                self.check_struct_defaults(node).map(|_| Progress::Checked)
            }
            EntityKind::MemresType(node) => self.check_memres_type(node).map(|_| Progress::Checked),
            EntityKind::Memres(node) => self.check_memres(node).map(|_| Progress::Checked),
            EntityKind::StaticIf(node) => self.check_static_if(node),
            EntityKind::Macro(node) => self.check_macro(node).map(|_| Progress::Checked),
            EntityKind::ConstraintCheck(node) => self.check_constraint(node),
            EntityKind::PolymorphQuery(node) => self.check_polyquery(node),
            EntityKind::EnumValue(node) => {
                let value = match &self.ast.node(node).kind {
                    NodeKind::EnumValue { value: Some(v), .. } => Some(*v),
                    _ => None,
                };
                match value {
                    Some(v) => self.check_expression(v).map(|_| Progress::Checked),
                    None => Ok(Progress::Checked),
                }
            }
            EntityKind::ProcessDirective(node) => self.check_process_directive(node),
            EntityKind::Expression(node) => {
                let r = self.check_expression(node);
                if r.is_ok() {
                    self.resolve_expression_type(node);
                }
                r.map(|_| Progress::Checked)
            }
            EntityKind::TypeAlias(node) => {
                if matches!(self.ast.node(node).kind, NodeKind::StructDecl(_)) {
                    self.check_struct(node).map(|_| Progress::Checked)
                } else {
                    self.check_type(node).map(|_| Progress::Checked)
                }
            }
            EntityKind::FileContents(node) => {
                if self.options.no_file_contents {
                    let span = self.span_of(node);
                    Err(self.error(
                        span,
                        CheckError::Message(
                            "#file_contents is disabled for this compilation".to_string(),
                        ),
                    ))
                } else {
                    Ok(Progress::Checked)
                }
            }
        };

        let status = CheckStatus::of(result);
        let entity = self.entities.get_mut(id);
        match status {
            CheckStatus::Yield => entity.attempts += 1,
            CheckStatus::Success => {
                entity.state = EntityState::CodeGen;
                entity.attempts = 0;
                self.round_progress = true;
            }
            CheckStatus::Complete => {
                entity.state = EntityState::Finalized;
                entity.attempts = 0;
                self.round_progress = true;
            }
            CheckStatus::ReturnToSymres => {
                entity.state = EntityState::ResolveSymbols;
                entity.attempts = 0;
                self.round_progress = true;
            }
            CheckStatus::Failed | CheckStatus::Error => {
                entity.state = EntityState::Failed;
                entity.attempts = 0;
                self.round_progress = true;
            }
        }
        status
    }

    // ----- the pump ------------------------------------------------------

    /// Resolve `Symbol` nodes in a subtree against a scope chain, aliasing
    /// them to their targets. Unresolved symbols are left in place (they
    /// yield, and eventually error under a detected cycle).
    pub fn resolve_symbols(&mut self, root: NodeId, scope: ScopeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let name = match &self.ast.node(id).kind {
                NodeKind::Symbol { name } => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = name {
                if let Some(target) = self.scopes.resolve(scope, &name) {
                    let span = self.span_of(id);
                    let mut alias = Node::new(NodeKind::Alias { of: target });
                    alias.span = span;
                    self.ast.replace(id, alias);
                }
                continue;
            }
            stack.extend(self.ast.children(id));
        }
    }

    /// The built-in symbol resolution hook: resolve what the entity's scope
    /// can see. Real symbol resolution is an external pass; this stand-in
    /// covers re-resolution after rewrites.
    fn default_resolve(&mut self, id: EntityId) -> bool {
        let entity = self.entities.get(id).clone();
        let node = entity.kind.node();

        if let NodeKind::Constraint(def) = &self.ast.node(node).kind {
            let scope = def.scope;
            let clauses = def.clauses.clone();
            if let Some(scope) = scope {
                for clause in clauses {
                    self.resolve_symbols(clause.expr, scope);
                    if let Some(expected) = clause.expected_type_expr {
                        self.resolve_symbols(expected, scope);
                    }
                }
            }
            return true;
        }

        if let Some(scope) = entity.scope {
            self.resolve_symbols(node, scope);
        }
        true
    }

    /// Drive rounds until every entity settles, using the built-in symbol
    /// resolver.
    pub fn run(&mut self) -> CheckSummary {
        self.run_with(&mut Checker::default_resolve)
    }

    /// Drive rounds with a caller-supplied symbol resolution hook. The hook
    /// returns false to fail the entity.
    pub fn run_with(
        &mut self,
        resolve: &mut dyn FnMut(&mut Checker, EntityId) -> bool,
    ) -> CheckSummary {
        let mut rounds = 0;

        loop {
            rounds += 1;
            self.round_progress = false;

            let count = self.entities.len();
            for i in 0..count {
                let id = EntityId(i as u32);
                if self.entities.get(id).parked {
                    continue;
                }
                match self.entities.state(id) {
                    EntityState::ResolveSymbols => {
                        if resolve(self, id) {
                            self.entities.get_mut(id).state = EntityState::CheckTypes;
                        } else {
                            self.entities.get_mut(id).state = EntityState::Failed;
                        }
                        self.round_progress = true;
                    }
                    EntityState::CheckTypes => {
                        self.check_entity(id);
                    }
                    _ => {}
                }
            }

            if self.entities.all_settled() {
                break;
            }
            if !self.round_progress {
                if self.cycle_detected {
                    // A full error round still could not settle everything;
                    // nothing further can change.
                    break;
                }
                debug!("no progress in round {rounds}; flagging cycle");
                self.cycle_detected = true;
            }
        }

        CheckSummary {
            rounds,
            code_gen: self.entities.count_in_state(EntityState::CodeGen),
            finalized: self.entities.count_in_state(EntityState::Finalized),
            failed: self.entities.count_in_state(EntityState::Failed),
            errors: self.sink.errors().count(),
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}
