//! Operator overloading and arithmetic elaboration: subscript-assign
//! lowering into a ternary overload call, and pointer arithmetic scaling.

use sable_ast::*;
use sable_check::{Checker, EntityKind, EntityState, StructStatus, StructType};

fn function_with_body(c: &mut Checker, body: Vec<NodeId>) -> NodeId {
    let mut def = FunctionDef::new("f");
    let block = c.ast.block(body);
    def.body = Some(block);
    let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
    let header = c.entities.insert_with_state(
        EntityKind::FunctionHeader(func),
        None,
        EntityState::CheckTypes,
    );
    let body_ent =
        c.entities
            .insert_with_state(EntityKind::Function(func), None, EntityState::CheckTypes);
    c.ast.node_mut(func).entity = Some(header);
    if let NodeKind::Function(def) = &mut c.ast.node_mut(func).kind {
        def.entity_header = Some(header);
        def.entity_body = Some(body_ent);
    }
    func
}

/// A checked function node with the given parameter types, usable as an
/// overload candidate without scheduling its own entities.
fn overload_fn(c: &mut Checker, name: &str, params: &[(&str, TypeId)], ret: TypeId) -> NodeId {
    let mut def = FunctionDef::new(name);
    let mut param_tys = Vec::new();
    for (pname, pty) in params {
        let local = c.ast.param(*pname);
        c.ast.node_mut(local).ty = Some(*pty);
        def.params.push(ParamDef {
            local,
            default_value: None,
            vararg_kind: VarArgKind::NotVA,
        });
        param_tys.push(*pty);
    }
    let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
    let fn_ty = c.types.function(param_tys, ret);
    c.ast.node_mut(func).ty = Some(fn_ty);
    func
}

fn empty_struct(c: &mut Checker, name: &str) -> TypeId {
    c.types.new_struct(StructType {
        name: name.to_string(),
        status: StructStatus::UsesDone,
        members: vec![],
        source_member_count: 0,
        polymorph_of: None,
        poly_sln: vec![],
        ast_node: None,
        scope: None,
    })
}

#[test]
fn subscript_assignment_lowers_to_overload_call() {
    let mut c = Checker::new();

    let map_ty = empty_struct(&mut c, "Map");
    let map_ptr = c.types.pointer_to(map_ty);
    let i32_ = c.types.basic.i32_;
    let void = c.types.basic.void;

    let set_fn = overload_fn(
        &mut c,
        "subscript_set",
        &[("m", map_ptr), ("k", i32_), ("v", i32_)],
        void,
    );
    c.add_operator_overload(BinaryOp::SubscriptEquals, set_fn);

    let m = c.ast.local("m");
    c.ast.node_mut(m).ty = Some(map_ptr);
    let k = c.ast.local("k");
    c.ast.node_mut(k).ty = Some(i32_);
    let v = c.ast.local("v");
    c.ast.node_mut(v).ty = Some(i32_);

    let sub = c.ast.subscript(m, k);
    let assign = c.ast.binary(BinaryOp::Assign, sub, v);
    function_with_body(&mut c, vec![assign]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    // The assignment node itself was replaced by the synthesized call.
    match &c.ast.node(assign).kind {
        NodeKind::Call(def) => {
            assert_eq!(def.callee, set_fn);
            let values: Vec<_> = def.args.values.iter().flatten().collect();
            assert_eq!(values.len(), 3);
        }
        other => panic!("expected a call after lowering, got {}", other.name()),
    }
    assert_eq!(c.ast.node(assign).ty, Some(void));
}

#[test]
fn pointer_arithmetic_scales_by_element_size() {
    let mut c = Checker::new();

    let i64_ = c.types.basic.i64_;
    let ptr = c.types.pointer_to(i64_);

    let p = c.ast.local("p");
    c.ast.node_mut(p).ty = Some(ptr);
    let two = c.ast.int(2);
    let sum = c.ast.binary(BinaryOp::Add, p, two);
    let sink = c.ast.local("q");
    let assign = c.ast.binary(BinaryOp::Assign, sink, sum);
    function_with_body(&mut c, vec![assign]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    // `p + 2` elaborated to `p + 2 * size_of(i64)`; the scaled operand
    // folds to the literal 16 and the result keeps the pointer type.
    assert_eq!(c.ast.node(sum).ty, Some(ptr));
    let right = match &c.ast.node(sum).kind {
        NodeKind::Binary(def) => def.right,
        other => panic!("expected binary node, got {}", other.name()),
    };
    match &c.ast.node(right).kind {
        NodeKind::NumLit {
            value: NumValue::Int(v),
        } => assert_eq!(*v, 16),
        NodeKind::Binary(def) => assert_eq!(def.op, BinaryOp::Mul),
        other => panic!("unexpected scaled operand: {}", other.name()),
    }
}

#[test]
fn bad_operator_for_type_is_rejected() {
    let mut c = Checker::new();

    let bool_ = c.types.basic.bool_;
    let a = c.ast.local("a");
    c.ast.node_mut(a).ty = Some(bool_);
    let b = c.ast.local("b");
    c.ast.node_mut(b).ty = Some(bool_);

    // `%` requires an integer type.
    let rem = c.ast.binary(BinaryOp::Mod, a, b);
    let sink = c.ast.local("r");
    let assign = c.ast.binary(BinaryOp::Assign, sink, rem);
    function_with_body(&mut c, vec![assign]);

    c.run();
    assert!(c.sink.has_errors());
}

#[test]
fn compound_assignment_desugars_and_checks() {
    let mut c = Checker::new();

    let i32_ = c.types.basic.i32_;
    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(i32_);
    let three = c.ast.int(3);
    let add_assign = c.ast.binary(BinaryOp::AssignAdd, x, three);
    function_with_body(&mut c, vec![add_assign]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    if let NodeKind::Binary(def) = &c.ast.node(add_assign).kind {
        assert_eq!(def.op, BinaryOp::Assign);
        match &c.ast.node(def.right).kind {
            NodeKind::Binary(inner) => assert_eq!(inner.op, BinaryOp::Add),
            NodeKind::NumLit { .. } => {}
            other => panic!("unexpected desugared right side: {}", other.name()),
        }
    } else {
        panic!("compound assignment should stay an assignment node");
    }
}

#[test]
fn assignment_in_expression_position_is_rejected() {
    let mut c = Checker::new();

    let i32_ = c.types.basic.i32_;
    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(i32_);
    let one = c.ast.int(1);
    let assign = c.ast.binary(BinaryOp::Assign, x, one);
    let two = c.ast.int(2);
    let outer = c.ast.binary(BinaryOp::Add, assign, two);
    let sink = c.ast.local("r");
    let stmt = c.ast.binary(BinaryOp::Assign, sink, outer);
    function_with_body(&mut c, vec![stmt]);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("Assignment not valid in expression")));
}
