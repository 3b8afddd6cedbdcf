//! The node arena. Nodes are allocated for the life of the compilation and
//! never freed; rewrites replace the payload at a stable index.

use crate::node::*;
use crate::NodeId;

#[derive(Debug, Default)]
pub struct AstArena {
    nodes: Vec<Node>,
}

impl AstArena {
    pub fn new() -> Self {
        AstArena { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Rewrite a node in place. The id stays valid, so every slot that
    /// referenced the old node now sees the replacement.
    pub fn replace(&mut self, id: NodeId, node: Node) {
        self.nodes[id.0 as usize] = node;
    }

    /// Replace `id` with a shallow copy of `source`'s current contents.
    pub fn replace_with_node(&mut self, id: NodeId, source: NodeId) {
        let copy = self.nodes[source.0 as usize].clone();
        self.nodes[id.0 as usize] = copy;
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deep-clone a subtree, producing fresh nodes with cleared check state.
    ///
    /// Used for macro expansion, `#insert` splicing, call-site rewriting and
    /// constraint re-cloning: the clone must pass through symbol resolution
    /// and checking again, so types, flags and entity links are reset.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self.node(id).clone();
        node.ty = None;
        node.flags = NodeFlags::empty();
        node.entity = None;

        node.type_node = node.type_node.map(|t| self.clone_subtree(t));

        node.kind = match node.kind {
            k @ (NodeKind::Error
            | NodeKind::Symbol { .. }
            | NodeKind::NumLit { .. }
            | NodeKind::StrLit { .. }
            | NodeKind::Local { .. }
            | NodeKind::Param { .. }
            | NodeKind::Global { .. }
            | NodeKind::ZeroValue
            | NodeKind::Package { .. }
            | NodeKind::ConstraintSentinel
            | NodeKind::FileContents { .. }
            | NodeKind::UnaryFieldAccess { .. }
            | NodeKind::Jump
            | NodeKind::Remove
            | NodeKind::BasicTypeRef { .. }
            | NodeKind::PolyVar { .. }
            | NodeKind::DirectiveDefined { .. }) => k,

            NodeKind::Memres(def) => NodeKind::Memres(def),

            NodeKind::EnumValue { name, value } => NodeKind::EnumValue {
                name,
                value: value.map(|v| self.clone_subtree(v)),
            },
            NodeKind::Alias { of } => NodeKind::Alias {
                of: self.clone_subtree(of),
            },

            NodeKind::Binary(def) => {
                let mut def = *def;
                def.left = self.clone_subtree(def.left);
                def.right = self.clone_subtree(def.right);
                def.overload_args = None;
                def.potential_substitute = None;
                NodeKind::Binary(Box::new(def))
            }
            NodeKind::Unary { op, expr } => NodeKind::Unary {
                op,
                expr: self.clone_subtree(expr),
            },
            NodeKind::Call(def) => {
                let mut def = *def;
                def.callee = self.clone_subtree(def.callee);
                def.args = self.clone_args(def.args);
                NodeKind::Call(Box::new(def))
            }
            NodeKind::Argument { value } => NodeKind::Argument {
                value: self.clone_subtree(value),
            },
            NodeKind::MethodCall { left, call } => NodeKind::MethodCall {
                left: self.clone_subtree(left),
                call: self.clone_subtree(call),
            },
            NodeKind::FieldAccess(def) => {
                let mut def = *def;
                def.expr = self.clone_subtree(def.expr);
                NodeKind::FieldAccess(Box::new(def))
            }
            NodeKind::Subscript(def) => {
                let mut def = *def;
                def.addr = self.clone_subtree(def.addr);
                def.index = self.clone_subtree(def.index);
                def.overload_substitute = None;
                NodeKind::Subscript(Box::new(def))
            }
            NodeKind::Slice { addr, range, elem_size } => NodeKind::Slice {
                addr: self.clone_subtree(addr),
                range: self.clone_subtree(range),
                elem_size,
            },
            NodeKind::AddressOf { expr, can_be_removed, .. } => NodeKind::AddressOf {
                expr: self.clone_subtree(expr),
                can_be_removed,
                potential_substitute: None,
            },
            NodeKind::Dereference { expr } => NodeKind::Dereference {
                expr: self.clone_subtree(expr),
            },
            NodeKind::SizeOf { type_expr, size } => NodeKind::SizeOf {
                type_expr: self.clone_subtree(type_expr),
                size,
            },
            NodeKind::AlignOf { type_expr, alignment } => NodeKind::AlignOf {
                type_expr: self.clone_subtree(type_expr),
                alignment,
            },

            NodeKind::StructLiteral(def) => {
                let mut def = *def;
                def.stnode = def.stnode.map(|s| self.clone_subtree(s));
                def.args = self.clone_args(def.args);
                NodeKind::StructLiteral(Box::new(def))
            }
            NodeKind::ArrayLiteral { atnode, values } => NodeKind::ArrayLiteral {
                atnode: atnode.map(|a| self.clone_subtree(a)),
                values: self.clone_list(values),
            },
            NodeKind::RangeLiteral { low, high, step } => NodeKind::RangeLiteral {
                low: self.clone_subtree(low),
                high: self.clone_subtree(high),
                step: step.map(|s| self.clone_subtree(s)),
            },
            NodeKind::Compound { exprs } => NodeKind::Compound {
                exprs: self.clone_list(exprs),
            },
            NodeKind::IfExpression { cond, true_expr, false_expr } => NodeKind::IfExpression {
                cond: self.clone_subtree(cond),
                true_expr: self.clone_subtree(true_expr),
                false_expr: self.clone_subtree(false_expr),
            },
            NodeKind::DoBlock { block } => NodeKind::DoBlock {
                block: self.clone_subtree(block),
            },
            // The code payload is cloned at splice time, not at capture time.
            NodeKind::CodeBlock { code } => NodeKind::CodeBlock { code },
            NodeKind::CallSite(def) => NodeKind::CallSite(def),

            NodeKind::Block(def) => {
                let mut def = *def;
                def.body = self.clone_list(def.body);
                def.statement_idx = 0;
                NodeKind::Block(Box::new(def))
            }
            NodeKind::Return { expr } => NodeKind::Return {
                expr: expr.map(|e| self.clone_subtree(e)),
            },
            NodeKind::If(def) => NodeKind::If(Box::new(self.clone_if_while(*def))),
            NodeKind::While(def) => NodeKind::While(Box::new(self.clone_if_while(*def))),
            NodeKind::StaticIf(def) => {
                let mut def = *def;
                def.cond = self.clone_subtree(def.cond);
                def.true_stmt = def.true_stmt.map(|s| self.clone_subtree(s));
                def.false_stmt = def.false_stmt.map(|s| self.clone_subtree(s));
                def.resolution = None;
                NodeKind::StaticIf(Box::new(def))
            }
            NodeKind::For(def) => {
                let mut def = *def;
                def.var = self.clone_subtree(def.var);
                def.iter = self.clone_subtree(def.iter);
                def.body = self.clone_subtree(def.body);
                def.loop_type = None;
                NodeKind::For(Box::new(def))
            }
            NodeKind::Switch(def) => {
                let mut def = *def;
                def.init = self.clone_list(def.init);
                def.scrutinee = self.clone_subtree(def.scrutinee);
                def.case_block = self.clone_subtree(def.case_block);
                def.cases = None;
                def.default_case = None;
                def.switch_kind = None;
                def.case_map.clear();
                def.case_exprs.clear();
                def.yield_return_index = 0;
                NodeKind::Switch(Box::new(def))
            }
            NodeKind::SwitchCase(def) => {
                let mut def = *def;
                def.values = self.clone_list(def.values);
                def.block = self.clone_subtree(def.block);
                NodeKind::SwitchCase(Box::new(def))
            }
            NodeKind::Defer { stmt } => NodeKind::Defer {
                stmt: self.clone_subtree(stmt),
            },

            NodeKind::Function(def) => {
                NodeKind::Function(Box::new(self.clone_function(*def)))
            }
            NodeKind::OverloadedFunction(def) => NodeKind::OverloadedFunction(def),
            NodeKind::Macro(def) => NodeKind::Macro(def),
            NodeKind::PolyProc(def) => NodeKind::PolyProc(def),
            NodeKind::Interface(def) => NodeKind::Interface(def),
            NodeKind::Constraint(def) => NodeKind::Constraint(def),
            NodeKind::PolyQuery(def) => NodeKind::PolyQuery(def),

            NodeKind::TypeAlias { to } => NodeKind::TypeAlias {
                to: self.clone_subtree(to),
            },
            NodeKind::PointerType { elem } => NodeKind::PointerType {
                elem: self.clone_subtree(elem),
            },
            NodeKind::SliceType { elem } => NodeKind::SliceType {
                elem: self.clone_subtree(elem),
            },
            NodeKind::DynArrType { elem } => NodeKind::DynArrType {
                elem: self.clone_subtree(elem),
            },
            NodeKind::VarArgType { elem } => NodeKind::VarArgType {
                elem: self.clone_subtree(elem),
            },
            NodeKind::ArrayType { count_expr, elem } => NodeKind::ArrayType {
                count_expr: count_expr.map(|c| self.clone_subtree(c)),
                elem: self.clone_subtree(elem),
            },
            NodeKind::FunctionType { params, ret } => NodeKind::FunctionType {
                params: self.clone_list(params),
                ret: self.clone_subtree(ret),
            },
            NodeKind::CompoundType { types } => NodeKind::CompoundType {
                types: self.clone_list(types),
            },
            NodeKind::TypeOf { expr, .. } => NodeKind::TypeOf {
                expr: self.clone_subtree(expr),
                resolved: None,
            },
            NodeKind::PolyCallType { callee, params } => NodeKind::PolyCallType {
                callee,
                params: self.clone_list(params),
            },
            NodeKind::StructDecl(def) => NodeKind::StructDecl(def),
            NodeKind::PolyStructDecl(def) => NodeKind::PolyStructDecl(def),

            NodeKind::DirectiveInsert { code_expr } => NodeKind::DirectiveInsert {
                code_expr: self.clone_subtree(code_expr),
            },
            NodeKind::DirectiveSolidify(def) => {
                let mut def = *def;
                def.known = def
                    .known
                    .into_iter()
                    .map(|(name, expr)| (name, self.clone_subtree(expr)))
                    .collect();
                NodeKind::DirectiveSolidify(Box::new(def))
            }
            NodeKind::DirectiveExport(def) => NodeKind::DirectiveExport(def),
            NodeKind::DirectiveInit(def) => NodeKind::DirectiveInit(def),
            NodeKind::DirectiveLibrary { name_expr, resolved_name } => {
                NodeKind::DirectiveLibrary { name_expr, resolved_name }
            }
        };

        self.alloc(node)
    }

    /// The direct child nodes of `id`, including its `type_node`. Used for
    /// generic tree walks (polymorphic-variable substitution).
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut out = Vec::new();
        if let Some(t) = node.type_node {
            out.push(t);
        }

        let mut push_args = |out: &mut Vec<NodeId>, args: &CallArgs| {
            out.extend(args.values.iter().flatten().copied());
            out.extend(args.named.iter().map(|nv| nv.value));
        };

        match &node.kind {
            NodeKind::Error
            | NodeKind::Symbol { .. }
            | NodeKind::NumLit { .. }
            | NodeKind::StrLit { .. }
            | NodeKind::Local { .. }
            | NodeKind::Param { .. }
            | NodeKind::Global { .. }
            | NodeKind::ZeroValue
            | NodeKind::Package { .. }
            | NodeKind::ConstraintSentinel
            | NodeKind::FileContents { .. }
            | NodeKind::UnaryFieldAccess { .. }
            | NodeKind::Jump
            | NodeKind::Remove
            | NodeKind::BasicTypeRef { .. }
            | NodeKind::PolyVar { .. }
            | NodeKind::DirectiveDefined { .. }
            | NodeKind::Memres(_)
            | NodeKind::OverloadedFunction(_)
            | NodeKind::Macro(_)
            | NodeKind::PolyProc(_)
            | NodeKind::Interface(_)
            | NodeKind::Constraint(_)
            | NodeKind::PolyQuery(_)
            | NodeKind::StructDecl(_)
            | NodeKind::PolyStructDecl(_)
            | NodeKind::CallSite(_)
            | NodeKind::CodeBlock { .. }
            | NodeKind::DirectiveExport(_)
            | NodeKind::DirectiveInit(_)
            | NodeKind::DirectiveLibrary { .. } => {}

            NodeKind::EnumValue { value, .. } => out.extend(*value),
            NodeKind::Alias { of } => out.push(*of),
            NodeKind::Binary(def) => {
                out.push(def.left);
                out.push(def.right);
            }
            NodeKind::Unary { expr, .. } => out.push(*expr),
            NodeKind::Call(def) => {
                out.push(def.callee);
                push_args(&mut out, &def.args);
            }
            NodeKind::Argument { value } => out.push(*value),
            NodeKind::MethodCall { left, call } => {
                out.push(*left);
                out.push(*call);
            }
            NodeKind::FieldAccess(def) => out.push(def.expr),
            NodeKind::Subscript(def) => {
                out.push(def.addr);
                out.push(def.index);
            }
            NodeKind::Slice { addr, range, .. } => {
                out.push(*addr);
                out.push(*range);
            }
            NodeKind::AddressOf { expr, .. } | NodeKind::Dereference { expr } => out.push(*expr),
            NodeKind::SizeOf { type_expr, .. } | NodeKind::AlignOf { type_expr, .. } => {
                out.push(*type_expr)
            }
            NodeKind::StructLiteral(def) => {
                out.extend(def.stnode);
                push_args(&mut out, &def.args);
            }
            NodeKind::ArrayLiteral { atnode, values } => {
                out.extend(*atnode);
                out.extend(values.iter().copied());
            }
            NodeKind::RangeLiteral { low, high, step } => {
                out.push(*low);
                out.push(*high);
                out.extend(*step);
            }
            NodeKind::Compound { exprs } => out.extend(exprs.iter().copied()),
            NodeKind::IfExpression { cond, true_expr, false_expr } => {
                out.push(*cond);
                out.push(*true_expr);
                out.push(*false_expr);
            }
            NodeKind::DoBlock { block } => out.push(*block),
            NodeKind::Block(def) => out.extend(def.body.iter().copied()),
            NodeKind::Return { expr } => out.extend(*expr),
            NodeKind::If(def) | NodeKind::While(def) => {
                out.extend(def.init.iter().copied());
                out.push(def.cond);
                out.extend(def.true_stmt);
                out.extend(def.false_stmt);
            }
            NodeKind::StaticIf(def) => {
                out.push(def.cond);
                out.extend(def.true_stmt);
                out.extend(def.false_stmt);
            }
            NodeKind::For(def) => {
                out.push(def.var);
                out.push(def.iter);
                out.push(def.body);
            }
            NodeKind::Switch(def) => {
                out.extend(def.init.iter().copied());
                out.push(def.scrutinee);
                out.push(def.case_block);
            }
            NodeKind::SwitchCase(def) => {
                out.extend(def.values.iter().copied());
                out.push(def.block);
            }
            NodeKind::Defer { stmt } => out.push(*stmt),
            NodeKind::Function(def) => {
                for p in &def.params {
                    out.push(p.local);
                    out.extend(p.default_value);
                }
                out.extend(def.return_type_node);
                out.extend(def.body);
                out.extend(def.tags.iter().copied());
            }
            NodeKind::TypeAlias { to } => out.push(*to),
            NodeKind::PointerType { elem }
            | NodeKind::SliceType { elem }
            | NodeKind::DynArrType { elem }
            | NodeKind::VarArgType { elem } => out.push(*elem),
            NodeKind::ArrayType { count_expr, elem } => {
                out.extend(*count_expr);
                out.push(*elem);
            }
            NodeKind::FunctionType { params, ret } => {
                out.extend(params.iter().copied());
                out.push(*ret);
            }
            NodeKind::CompoundType { types } => out.extend(types.iter().copied()),
            NodeKind::TypeOf { expr, .. } => out.push(*expr),
            NodeKind::PolyCallType { params, .. } => out.extend(params.iter().copied()),
            NodeKind::DirectiveInsert { code_expr } => out.push(*code_expr),
            NodeKind::DirectiveSolidify(def) => {
                out.extend(def.known.iter().map(|(_, expr)| *expr))
            }
        }

        out
    }

    fn clone_list(&mut self, ids: Vec<NodeId>) -> Vec<NodeId> {
        ids.into_iter().map(|id| self.clone_subtree(id)).collect()
    }

    fn clone_args(&mut self, args: CallArgs) -> CallArgs {
        CallArgs {
            values: args
                .values
                .into_iter()
                .map(|v| v.map(|id| self.clone_subtree(id)))
                .collect(),
            named: args
                .named
                .into_iter()
                .map(|nv| NamedValue {
                    name: nv.name,
                    value: self.clone_subtree(nv.value),
                })
                .collect(),
        }
    }

    fn clone_if_while(&mut self, mut def: IfWhileDef) -> IfWhileDef {
        def.init = self.clone_list(def.init);
        def.cond = self.clone_subtree(def.cond);
        def.true_stmt = def.true_stmt.map(|s| self.clone_subtree(s));
        def.false_stmt = def.false_stmt.map(|s| self.clone_subtree(s));
        def
    }

    fn clone_function(&mut self, mut def: FunctionDef) -> FunctionDef {
        def.params = def
            .params
            .into_iter()
            .map(|mut p| {
                p.local = self.clone_subtree(p.local);
                p.default_value = p.default_value.map(|d| self.clone_subtree(d));
                p
            })
            .collect();
        def.return_type_node = def.return_type_node.map(|r| self.clone_subtree(r));
        def.body = def.body.map(|b| self.clone_subtree(b));
        def.tags = self.clone_list(def.tags);
        def.entity_header = None;
        def.entity_body = None;
        def.scope = None;
        def
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Span;

    #[test]
    fn replace_keeps_the_id_stable() {
        let mut arena = AstArena::new();
        let a = arena.int(1);
        let b = arena.int(2);
        let sum = arena.binary(BinaryOp::Add, a, b);

        let folded = Node::new(NodeKind::NumLit {
            value: NumValue::Int(3),
        });
        arena.replace(sum, folded);

        assert!(matches!(
            arena.node(sum).kind,
            NodeKind::NumLit {
                value: NumValue::Int(3)
            }
        ));
    }

    #[test]
    fn clone_subtree_resets_check_state() {
        let mut arena = AstArena::new();
        let a = arena.int(1);
        arena.node_mut(a).flags |= NodeFlags::HAS_BEEN_CHECKED | NodeFlags::COMPTIME;
        let b = arena.int(2);
        let sum = arena.binary(BinaryOp::Add, a, b);
        arena.node_mut(sum).span = Span::new(3, 8);
        arena.node_mut(sum).flags |= NodeFlags::HAS_BEEN_CHECKED;

        let clone = arena.clone_subtree(sum);
        assert_ne!(clone, sum);
        assert_eq!(arena.node(clone).span, Span::new(3, 8));
        assert_eq!(arena.node(clone).flags, NodeFlags::empty());

        let (left, right) = match &arena.node(clone).kind {
            NodeKind::Binary(def) => (def.left, def.right),
            _ => panic!("clone changed the node kind"),
        };
        assert_ne!(left, a);
        assert_ne!(right, b);
        assert_eq!(arena.node(left).flags, NodeFlags::empty());
    }

    #[test]
    fn children_cover_operands_and_type_nodes() {
        let mut arena = AstArena::new();
        let a = arena.int(1);
        let b = arena.int(2);
        let sum = arena.binary(BinaryOp::Add, a, b);
        let ty = arena.poly_var("T");
        arena.node_mut(sum).type_node = Some(ty);

        let children = arena.children(sum);
        assert_eq!(children, vec![ty, a, b]);
    }
}
