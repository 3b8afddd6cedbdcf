//! Construction helpers shared by the checker's synthesized nodes and by
//! tests that assemble trees by hand.

use crate::node::*;
use crate::{AstArena, NodeId, Span, TypeId};

impl AstArena {
    pub fn int(&mut self, value: i64) -> NodeId {
        self.alloc(Node::new(NodeKind::NumLit {
            value: NumValue::Int(value),
        }))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.alloc(Node::new(NodeKind::NumLit {
            value: NumValue::Float(value),
        }))
    }

    pub fn bool_lit(&mut self, value: bool) -> NodeId {
        self.alloc(Node::new(NodeKind::NumLit {
            value: NumValue::Bool(value),
        }))
    }

    pub fn str_lit(&mut self, value: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::StrLit {
            value: value.into(),
        }))
    }

    pub fn symbol(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::Symbol { name: name.into() }))
    }

    pub fn local(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::Local { name: name.into() }))
    }

    pub fn param(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::Param { name: name.into() }))
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        let span = self.node(left).span.merge(self.node(right).span);
        self.alloc(
            Node::new(NodeKind::Binary(Box::new(BinaryDef {
                op,
                left,
                right,
                overload_args: None,
                potential_substitute: None,
            })))
            .with_span(span),
        )
    }

    pub fn unary(&mut self, op: UnaryOp, expr: NodeId) -> NodeId {
        self.alloc(Node::new(NodeKind::Unary { op, expr }))
    }

    pub fn address_of(&mut self, expr: NodeId) -> NodeId {
        let span = self.node(expr).span;
        self.alloc(
            Node::new(NodeKind::AddressOf {
                expr,
                can_be_removed: false,
                potential_substitute: None,
            })
            .with_span(span),
        )
    }

    pub fn dereference(&mut self, expr: NodeId) -> NodeId {
        self.alloc(Node::new(NodeKind::Dereference { expr }))
    }

    pub fn argument(&mut self, value: NodeId) -> NodeId {
        let span = self.node(value).span;
        self.alloc(Node::new(NodeKind::Argument { value }).with_span(span))
    }

    pub fn field_access(&mut self, expr: NodeId, field: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::FieldAccess(Box::new(FieldAccessDef {
            expr,
            field: field.into(),
            offset: None,
            idx: None,
        }))))
    }

    pub fn subscript(&mut self, addr: NodeId, index: NodeId) -> NodeId {
        self.alloc(Node::new(NodeKind::Subscript(Box::new(SubscriptDef {
            addr,
            index,
            elem_size: None,
            overload_substitute: None,
        }))))
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.alloc(Node::new(NodeKind::Call(Box::new(CallDef {
            callee,
            args: CallArgs::positional(args),
            va_kind: None,
            intrinsic: None,
        }))))
    }

    pub fn method_call(&mut self, left: NodeId, call: NodeId) -> NodeId {
        self.alloc(Node::new(NodeKind::MethodCall { left, call }))
    }

    pub fn range(&mut self, low: NodeId, high: NodeId) -> NodeId {
        let span = self.node(low).span.merge(self.node(high).span);
        self.alloc(Node::new(NodeKind::RangeLiteral { low, high, step: None }).with_span(span))
    }

    pub fn zero_value(&mut self, span: Span, ty: TypeId) -> NodeId {
        let mut node = Node::new(NodeKind::ZeroValue).with_span(span);
        node.ty = Some(ty);
        node.flags |= NodeFlags::COMPTIME;
        self.alloc(node)
    }

    pub fn block(&mut self, body: Vec<NodeId>) -> NodeId {
        self.alloc(Node::new(NodeKind::Block(Box::new(BlockDef::new(body)))))
    }

    pub fn return_stmt(&mut self, expr: Option<NodeId>) -> NodeId {
        self.alloc(Node::new(NodeKind::Return { expr }))
    }

    pub fn type_ref(&mut self, ty: TypeId) -> NodeId {
        self.alloc(Node::new(NodeKind::BasicTypeRef { ty }))
    }

    pub fn pointer_type(&mut self, elem: NodeId) -> NodeId {
        self.alloc(Node::new(NodeKind::PointerType { elem }))
    }

    pub fn poly_var(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::PolyVar { name: name.into() }))
    }
}
