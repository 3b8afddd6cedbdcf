//! Switch checking: integer case maps, range expansion with overlap
//! detection, and equality-based switches over non-integer scrutinees.

use sable_ast::*;
use sable_check::{CheckError, Checker, EntityKind, EntityState};
use std::collections::HashMap;

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

fn switch_case(c: &mut Checker, values: Vec<NodeId>, is_default: bool) -> NodeId {
    let block = c.ast.block(vec![]);
    c.ast.alloc(Node::new(NodeKind::SwitchCase(Box::new(SwitchCaseDef {
        values,
        block,
        is_default,
    }))))
}

fn switch_stmt(c: &mut Checker, scrutinee: NodeId, cases: Vec<NodeId>) -> NodeId {
    let case_block = c.ast.block(cases);
    c.ast.alloc(Node::new(NodeKind::Switch(Box::new(SwitchDef {
        init: Vec::new(),
        scrutinee,
        case_block,
        cases: None,
        default_case: None,
        switch_kind: None,
        case_map: HashMap::new(),
        min_case: i64::MAX,
        max_case: i64::MIN,
        case_exprs: Vec::new(),
        yield_return_index: 0,
    }))))
}

#[test]
fn overlapping_range_and_value_reports_one_collision() {
    let mut c = Checker::new();

    let scrutinee = c.ast.int(5);
    let low = c.ast.int(1);
    let high = c.ast.int(5);
    let range = c.ast.range(low, high);
    let case_a = switch_case(&mut c, vec![range], false);
    let four = c.ast.int(4);
    let case_b = switch_case(&mut c, vec![four], false);
    let sw = switch_stmt(&mut c, scrutinee, vec![case_a, case_b]);
    function_with_body(&mut c, vec![sw]);

    c.run();

    let collisions: Vec<_> = c
        .sink
        .errors()
        .filter(|d| matches!(d.error, CheckError::DuplicateCase(4)))
        .collect();
    assert_eq!(collisions.len(), 1, "{:?}", c.sink.diagnostics());
}

#[test]
fn distinct_integer_cases_pass() {
    let mut c = Checker::new();

    let scrutinee = c.ast.int(2);
    let one = c.ast.int(1);
    let case_a = switch_case(&mut c, vec![one], false);
    let two = c.ast.int(2);
    let case_b = switch_case(&mut c, vec![two], false);
    let default = switch_case(&mut c, vec![], true);
    let sw = switch_stmt(&mut c, scrutinee, vec![case_a, case_b, default]);
    function_with_body(&mut c, vec![sw]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    if let NodeKind::Switch(def) = &c.ast.node(sw).kind {
        assert_eq!(def.switch_kind, Some(SwitchKind::Integer));
        assert_eq!(def.case_map.len(), 2);
        assert!(def.default_case.is_some());
    } else {
        panic!("switch node was rewritten unexpectedly");
    }
}

#[test]
fn multiple_defaults_are_rejected() {
    let mut c = Checker::new();

    let scrutinee = c.ast.int(0);
    let d1 = switch_case(&mut c, vec![], true);
    let d2 = switch_case(&mut c, vec![], true);
    let sw = switch_stmt(&mut c, scrutinee, vec![d1, d2]);
    function_with_body(&mut c, vec![sw]);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| matches!(d.error, CheckError::DuplicateDefault)));
}

#[test]
fn non_integer_scrutinee_uses_equality_comparisons() {
    let mut c = Checker::new();

    // A struct scrutinee is not integer-like, so each case value becomes a
    // synthesized `scrutinee == value` comparison. Comparing structs has no
    // equality operator, which surfaces as an error rather than a map.
    let s_ty = c.types.new_struct(sable_check::StructType {
        name: "S".to_string(),
        status: sable_check::StructStatus::UsesDone,
        members: vec![],
        source_member_count: 0,
        polymorph_of: None,
        poly_sln: vec![],
        ast_node: None,
        scope: None,
    });

    let scrutinee = c.ast.local("s");
    c.ast.node_mut(scrutinee).ty = Some(s_ty);
    let other = c.ast.local("t");
    c.ast.node_mut(other).ty = Some(s_ty);

    let case_a = switch_case(&mut c, vec![other], false);
    let sw = switch_stmt(&mut c, scrutinee, vec![case_a]);
    function_with_body(&mut c, vec![sw]);

    c.run();

    if let NodeKind::Switch(def) = &c.ast.node(sw).kind {
        assert_eq!(def.switch_kind, Some(SwitchKind::UseEquals));
    } else {
        panic!("switch node was rewritten unexpectedly");
    }
    assert!(c.sink.has_errors());
}
