//! For-loop iterable classification and the loop-variable types it
//! produces, plus the `#remove` legality rule.

use sable_ast::*;
use sable_check::{Checker, EntityKind, EntityState};

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

fn for_loop(c: &mut Checker, iter: NodeId, by_pointer: bool, body: Vec<NodeId>) -> (NodeId, NodeId) {
    let var = c.ast.local("it");
    let block = c.ast.block(body);
    let node = c.ast.alloc(Node::new(NodeKind::For(Box::new(ForDef {
        var,
        iter,
        body: block,
        by_pointer,
        no_close: false,
        loop_type: None,
    }))));
    (node, var)
}

fn classify(c: &Checker, node: NodeId) -> Option<ForLoop> {
    match &c.ast.node(node).kind {
        NodeKind::For(def) => def.loop_type,
        _ => None,
    }
}

#[test]
fn range_iterable() {
    let mut c = Checker::new();
    let low = c.ast.int(0);
    let high = c.ast.int(10);
    let range = c.ast.range(low, high);
    let (node, var) = for_loop(&mut c, range, false, vec![]);
    function_with_body(&mut c, vec![node]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(classify(&c, node), Some(ForLoop::Range));
    assert_eq!(c.ast.node(var).ty, Some(c.types.basic.i32_));
    assert!(c
        .ast
        .node(var)
        .flags
        .contains(NodeFlags::CANNOT_TAKE_ADDR));
}

#[test]
fn integer_iterable_sugars_into_a_range() {
    let mut c = Checker::new();
    let n = c.ast.int(10);
    let (node, var) = for_loop(&mut c, n, false, vec![]);
    function_with_body(&mut c, vec![node]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(classify(&c, node), Some(ForLoop::Range));
    assert_eq!(c.ast.node(var).ty, Some(c.types.basic.i32_));

    let iter = match &c.ast.node(node).kind {
        NodeKind::For(def) => def.iter,
        _ => unreachable!(),
    };
    assert!(matches!(
        c.ast.node(iter).kind,
        NodeKind::RangeLiteral { .. }
    ));
}

#[test]
fn slice_and_array_and_dyn_array_iterables() {
    let mut c = Checker::new();
    let f64_ = c.types.basic.f64_;

    let slice_ty = c.types.slice_of(f64_);
    let s = c.ast.local("s");
    c.ast.node_mut(s).ty = Some(slice_ty);
    let (slice_for, slice_var) = for_loop(&mut c, s, false, vec![]);

    let array_ty = c.types.array_of(f64_, 4);
    let a = c.ast.local("a");
    c.ast.node_mut(a).ty = Some(array_ty);
    let (array_for, array_var) = for_loop(&mut c, a, true, vec![]);

    let dyn_ty = c.types.dyn_array_of(f64_);
    let d = c.ast.local("d");
    c.ast.node_mut(d).ty = Some(dyn_ty);
    let (dyn_for, dyn_var) = for_loop(&mut c, d, false, vec![]);

    function_with_body(&mut c, vec![slice_for, array_for, dyn_for]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    assert_eq!(classify(&c, slice_for), Some(ForLoop::Slice));
    assert_eq!(c.ast.node(slice_var).ty, Some(f64_));

    // Iterating an array by pointer gives `^elem` and pins the variable.
    assert_eq!(classify(&c, array_for), Some(ForLoop::Array));
    let f64_ptr = c.types.pointer_to(f64_);
    assert_eq!(c.ast.node(array_var).ty, Some(f64_ptr));
    assert!(c
        .ast
        .node(array_var)
        .flags
        .contains(NodeFlags::CANNOT_TAKE_ADDR));

    assert_eq!(classify(&c, dyn_for), Some(ForLoop::DynArr));
    assert_eq!(c.ast.node(dyn_var).ty, Some(f64_));
}

#[test]
fn iterator_iterable_permits_remove() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;
    let iter_ty = c.iterator_of(i32_);

    let it = c.ast.local("it");
    c.ast.node_mut(it).ty = Some(iter_ty);
    let remove = c.ast.alloc(Node::new(NodeKind::Remove));
    let (node, var) = for_loop(&mut c, it, false, vec![remove]);
    function_with_body(&mut c, vec![node]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(classify(&c, node), Some(ForLoop::Iterator));
    assert_eq!(c.ast.node(var).ty, Some(i32_));
}

#[test]
fn remove_outside_iterator_loop_is_rejected() {
    let mut c = Checker::new();
    let low = c.ast.int(0);
    let high = c.ast.int(3);
    let range = c.ast.range(low, high);
    let remove = c.ast.alloc(Node::new(NodeKind::Remove));
    let (node, _) = for_loop(&mut c, range, false, vec![remove]);
    function_with_body(&mut c, vec![node]);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("#remove")));
}

#[test]
fn pointer_iteration_over_a_range_is_rejected() {
    let mut c = Checker::new();
    let low = c.ast.int(0);
    let high = c.ast.int(3);
    let range = c.ast.range(low, high);
    let (node, _) = for_loop(&mut c, range, true, vec![]);
    function_with_body(&mut c, vec![node]);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("Cannot iterate by pointer")));
}

#[test]
fn non_iterable_type_is_rejected() {
    let mut c = Checker::new();
    let b = c.ast.bool_lit(true);
    let (node, _) = for_loop(&mut c, b, false, vec![]);
    function_with_body(&mut c, vec![node]);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("Cannot iterate over")));

    // Classification failed before the checked flag was set, so the node
    // stays re-checkable.
    assert!(!c.ast.node(node).checked());
}
