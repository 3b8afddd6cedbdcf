//! Scheduler-level properties: progress/cycle detection, idempotence of
//! re-checking settled entities, static-if entity scheduling, and macro /
//! splice rewrites that return through symbol resolution.

use sable_ast::*;
use sable_check::{Checker, CheckStatus, EntityKind, EntityState};

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

#[test]
fn unresolvable_symbol_becomes_a_hard_error_after_a_stalled_cycle() {
    let mut c = Checker::new();
    let sym = c.ast.symbol("missing");
    let ent = c
        .entities
        .insert_with_state(EntityKind::Expression(sym), None, EntityState::CheckTypes);
    c.ast.node_mut(sym).entity = Some(ent);

    let summary = c.run();
    assert!(c.cycle_detected);
    assert!(summary.errors > 0);
    assert_eq!(c.entities.state(ent), EntityState::Failed);
}

#[test]
fn rechecking_a_settled_entity_is_a_no_op() {
    let mut c = Checker::new();
    let two = c.ast.int(2);
    let three = c.ast.int(3);
    let sum = c.ast.binary(BinaryOp::Add, two, three);
    let ent = c
        .entities
        .insert_with_state(EntityKind::Expression(sum), None, EntityState::CheckTypes);
    c.ast.node_mut(sum).entity = Some(ent);

    let summary = c.run();
    assert_eq!(summary.errors, 0);

    // Comptime operands folded into a literal.
    match &c.ast.node(sum).kind {
        NodeKind::NumLit {
            value: NumValue::Int(v),
        } => assert_eq!(*v, 5),
        other => panic!("expected folded literal, got {}", other.name()),
    }

    let folded = c.ast.node(sum).clone();
    c.entities.get_mut(ent).state = EntityState::CheckTypes;
    let status = c.check_entity(ent);
    assert_eq!(status, CheckStatus::Success);

    let after = c.ast.node(sum);
    assert_eq!(after.ty, folded.ty);
    assert_eq!(after.flags, folded.flags);
    assert!(matches!(
        after.kind,
        NodeKind::NumLit {
            value: NumValue::Int(5)
        }
    ));
}

#[test]
fn static_if_schedules_only_the_chosen_side() {
    let mut c = Checker::new();

    let taken = c.ast.int(1);
    let taken_ent = c.park_entity_for_node(EntityKind::Expression(taken), None);
    let skipped = c.ast.symbol("never_resolved");
    let skipped_ent = c.park_entity_for_node(EntityKind::Expression(skipped), None);

    let cond = c.ast.bool_lit(true);
    let static_if = c.ast.alloc(Node::new(NodeKind::StaticIf(Box::new(StaticIfDef {
        cond,
        true_stmt: None,
        false_stmt: None,
        true_entities: vec![taken_ent],
        false_entities: vec![skipped_ent],
        resolution: None,
    }))));
    let sif_ent = c
        .entities
        .insert_with_state(EntityKind::StaticIf(static_if), None, EntityState::CheckTypes);
    c.ast.node_mut(static_if).entity = Some(sif_ent);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    assert_eq!(c.entities.state(sif_ent), EntityState::Finalized);
    assert_eq!(c.entities.state(taken_ent), EntityState::CodeGen);
    // The untaken side never entered the pipeline.
    assert!(c.entities.get(skipped_ent).parked);
}

#[test]
fn non_comptime_static_if_condition_is_rejected() {
    let mut c = Checker::new();
    let x = c.ast.local("x");
    let bool_ = c.types.basic.bool_;
    c.ast.node_mut(x).ty = Some(bool_);

    let static_if = c.ast.alloc(Node::new(NodeKind::StaticIf(Box::new(StaticIfDef {
        cond: x,
        true_stmt: None,
        false_stmt: None,
        true_entities: vec![],
        false_entities: vec![],
        resolution: None,
    }))));
    let ent = c
        .entities
        .insert_with_state(EntityKind::StaticIf(static_if), None, EntityState::CheckTypes);
    c.ast.node_mut(static_if).entity = Some(ent);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("compile time known")));
}

#[test]
fn insert_splices_the_code_block_and_rechecks() {
    let mut c = Checker::new();

    let one = c.ast.int(1);
    let two = c.ast.int(2);
    let sum = c.ast.binary(BinaryOp::Add, one, two);
    let sink = c.ast.local("r");
    let assign = c.ast.binary(BinaryOp::Assign, sink, sum);
    let code_body = c.ast.block(vec![assign]);
    let code = c.ast.alloc(Node::new(NodeKind::CodeBlock { code: code_body }));

    let insert = c
        .ast
        .alloc(Node::new(NodeKind::DirectiveInsert { code_expr: code }));
    function_with_body(&mut c, vec![insert]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    // The insert node was replaced by a fresh clone of the code block.
    match &c.ast.node(insert).kind {
        NodeKind::Block(def) => {
            assert_eq!(def.body.len(), 1);
            assert_ne!(def.body[0], assign);
            assert_eq!(def.rules, BlockRule::Normal);
        }
        other => panic!("expected spliced block, got {}", other.name()),
    }
}

#[test]
fn macro_call_expands_in_place() {
    let mut c = Checker::new();

    // The macro body assigns a literal; expanding it replaces the call.
    let sink = c.ast.local("r");
    let seven = c.ast.int(7);
    let assign = c.ast.binary(BinaryOp::Assign, sink, seven);
    let macro_body_block = c.ast.block(vec![assign]);

    let mut macro_fn_def = FunctionDef::new("emit");
    macro_fn_def.body = Some(macro_body_block);
    let void_ref = {
        let v = c.types.basic.void;
        c.ast.type_ref(v)
    };
    macro_fn_def.return_type_node = Some(void_ref);
    let macro_fn = c
        .ast
        .alloc(Node::new(NodeKind::Function(Box::new(macro_fn_def))));
    let macro_node = c
        .ast
        .alloc(Node::new(NodeKind::Macro(Box::new(MacroDef { body: macro_fn }))));
    let macro_ent = c
        .entities
        .insert_with_state(EntityKind::Macro(macro_node), None, EntityState::CheckTypes);
    c.ast.node_mut(macro_node).entity = Some(macro_ent);

    let call = c.ast.call(macro_node, vec![]);
    function_with_body(&mut c, vec![call]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    match &c.ast.node(call).kind {
        NodeKind::Block(def) => assert_eq!(def.rules, BlockRule::Macro),
        other => panic!("expected expanded macro block, got {}", other.name()),
    }
}

#[test]
fn memres_initializer_must_be_comptime() {
    let mut c = Checker::new();

    let x = c.ast.local("x");
    let i32_ = c.types.basic.i32_;
    c.ast.node_mut(x).ty = Some(i32_);
    let memres = c.ast.alloc(Node::new(NodeKind::Memres(Box::new(MemresDef {
        name: "g".to_string(),
        initial_value: Some(x),
        threadlocal: false,
        type_entity: None,
    }))));
    let ent = c
        .entities
        .insert_with_state(EntityKind::Memres(memres), None, EntityState::CheckTypes);
    c.ast.node_mut(memres).entity = Some(ent);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("compile time known")));
}

#[test]
fn memres_type_inferred_from_comptime_initializer() {
    let mut c = Checker::new();

    let ten = c.ast.int(10);
    let memres = c.ast.alloc(Node::new(NodeKind::Memres(Box::new(MemresDef {
        name: "g".to_string(),
        initial_value: Some(ten),
        threadlocal: false,
        type_entity: None,
    }))));
    let ent = c
        .entities
        .insert_with_state(EntityKind::Memres(memres), None, EntityState::CheckTypes);
    c.ast.node_mut(memres).entity = Some(ent);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(memres).ty, Some(c.types.basic.i32_));
}
