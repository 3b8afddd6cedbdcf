//! Method calls: `x->foo(a)` prepends the receiver as the first argument,
//! by address for value receivers and directly for pointer receivers.

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

fn checked_fn(c: &mut Checker, name: &str, params: &[TypeId], ret: TypeId) -> NodeId {
    let mut def = FunctionDef::new(name);
    for (i, pty) in params.iter().enumerate() {
        let local = c.ast.param(format!("p{i}"));
        c.ast.node_mut(local).ty = Some(*pty);
        def.params.push(ParamDef {
            local,
            default_value: None,
            vararg_kind: VarArgKind::NotVA,
        });
    }
    let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
    let fn_ty = c.types.function(params.to_vec(), ret);
    c.ast.node_mut(func).ty = Some(fn_ty);
    func
}

fn setup(c: &mut Checker) -> (TypeId, TypeId, NodeId) {
    let t_ty = c.types.new_struct(StructType {
        name: "T".to_string(),
        status: StructStatus::UsesDone,
        members: vec![],
        source_member_count: 0,
        polymorph_of: None,
        poly_sln: vec![],
        ast_node: None,
        scope: None,
    });
    let t_ptr = c.types.pointer_to(t_ty);
    let i32_ = c.types.basic.i32_;
    let void = c.types.basic.void;
    let foo = checked_fn(c, "foo", &[t_ptr, i32_], void);
    (t_ty, t_ptr, foo)
}

#[test]
fn value_receiver_is_passed_by_address() {
    let mut c = Checker::new();
    let (t_ty, _, foo) = setup(&mut c);

    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(t_ty);
    let one = c.ast.int(1);
    let call = c.ast.call(foo, vec![one]);
    let mcall = c.ast.method_call(x, call);
    function_with_body(&mut c, vec![mcall]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    // The method-call node became the call, with `^x` prepended. The
    // synthesized address-of is removable so it can be elided later if the
    // receiver turns out not to be an l-value.
    let def = match &c.ast.node(mcall).kind {
        NodeKind::Call(def) => def,
        other => panic!("expected call after elaboration, got {}", other.name()),
    };
    assert_eq!(def.args.values.len(), 2);

    let first = def.args.values[0].expect("receiver argument present");
    let receiver = match &c.ast.node(first).kind {
        NodeKind::Argument { value } => *value,
        _ => first,
    };
    match &c.ast.node(receiver).kind {
        NodeKind::AddressOf { expr, can_be_removed, .. } => {
            assert_eq!(*expr, x);
            assert!(*can_be_removed);
        }
        other => panic!("expected address-of receiver, got {}", other.name()),
    }
}

#[test]
fn pointer_receiver_is_passed_directly() {
    let mut c = Checker::new();
    let (_, t_ptr, foo) = setup(&mut c);

    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(t_ptr);
    let one = c.ast.int(1);
    let call = c.ast.call(foo, vec![one]);
    let mcall = c.ast.method_call(x, call);
    function_with_body(&mut c, vec![mcall]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    let def = match &c.ast.node(mcall).kind {
        NodeKind::Call(def) => def,
        other => panic!("expected call after elaboration, got {}", other.name()),
    };
    let first = def.args.values[0].expect("receiver argument present");
    let receiver = match &c.ast.node(first).kind {
        NodeKind::Argument { value } => *value,
        _ => first,
    };
    assert_eq!(receiver, x);
}
