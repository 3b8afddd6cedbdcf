//! Expression elaboration: struct and array literals, field access with
//! `use`-through-pointer members and suggestions, subscripts and slices,
//! address-of, dereference, casts and if-expressions.

use pretty_assertions::assert_eq;

use sable_ast::*;
use sable_check::{
    CheckError, Checker, EntityKind, EntityState, StructMember, StructStatus, StructType,
};

fn expr_entity(c: &mut Checker, node: NodeId) -> sable_ast::EntityId {
    let ent = c
        .entities
        .insert_with_state(EntityKind::Expression(node), None, EntityState::CheckTypes);
    c.ast.node_mut(node).entity = Some(ent);
    ent
}

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

fn vec2(c: &mut Checker) -> TypeId {
    let f32_ = c.types.basic.f32_;
    let member = |name: &str, idx, offset| StructMember {
        name: name.to_string(),
        ty: f32_,
        idx,
        offset,
        initial_value: None,
        used: false,
        use_through_pointer_index: None,
    };
    c.types.new_struct(StructType {
        name: "Vec2".to_string(),
        status: StructStatus::UsesDone,
        members: vec![member("x", 0, 0), member("y", 1, 4)],
        source_member_count: 2,
        polymorph_of: None,
        poly_sln: vec![],
        ast_node: None,
        scope: None,
    })
}

#[test]
fn struct_literal_fills_members_and_is_comptime() {
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);

    let stnode = c.ast.type_ref(vec2_ty);
    let x = c.ast.float(1.0);
    let y = c.ast.float(2.0);
    let sl = c.ast.alloc(Node::new(NodeKind::StructLiteral(Box::new(
        StructLiteralDef {
            stnode: Some(stnode),
            args: CallArgs::positional(vec![x, y]),
        },
    ))));
    expr_entity(&mut c, sl);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(sl).ty, Some(vec2_ty));
    assert!(c.ast.node(sl).comptime());
    assert_eq!(c.ast.node(x).ty, Some(c.types.basic.f32_));
}

#[test]
fn struct_literal_with_named_argument_and_missing_member() {
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);

    let stnode = c.ast.type_ref(vec2_ty);
    let y = c.ast.float(2.0);
    let sl = c.ast.alloc(Node::new(NodeKind::StructLiteral(Box::new(
        StructLiteralDef {
            stnode: Some(stnode),
            args: CallArgs {
                values: vec![],
                named: vec![NamedValue {
                    name: "y".to_string(),
                    value: y,
                }],
            },
        },
    ))));
    expr_entity(&mut c, sl);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("Value not given for member")));
}

#[test]
fn array_literal_types_each_element() {
    let mut c = Checker::new();
    let i64_ = c.types.basic.i64_;

    let atnode = c.ast.type_ref(i64_);
    let one = c.ast.int(1);
    let two = c.ast.int(2);
    let al = c.ast.alloc(Node::new(NodeKind::ArrayLiteral {
        atnode: Some(atnode),
        values: vec![one, two],
    }));
    expr_entity(&mut c, al);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    let expected = c.types.array_of(i64_, 2);
    assert_eq!(c.ast.node(al).ty, Some(expected));
    assert!(c.ast.node(al).comptime());
    assert_eq!(c.ast.node(one).ty, Some(i64_));
}

#[test]
fn field_access_resolves_offsets_and_suggests_names() {
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);

    let v = c.ast.local("v");
    c.ast.node_mut(v).ty = Some(vec2_ty);
    let access = c.ast.field_access(v, "y");
    expr_entity(&mut c, access);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(access).ty, Some(c.types.basic.f32_));
    if let NodeKind::FieldAccess(def) = &c.ast.node(access).kind {
        assert_eq!(def.offset, Some(4));
        assert_eq!(def.idx, Some(1));
    } else {
        panic!("field access was rewritten unexpectedly");
    }

    // A typo gets a did-you-mean suggestion.
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);
    let v = c.ast.local("v");
    c.ast.node_mut(v).ty = Some(vec2_ty);
    let access = c.ast.field_access(v, "z");
    expr_entity(&mut c, access);
    c.run();
    assert!(c.sink.errors().any(|d| matches!(
        &d.error,
        CheckError::UndefinedField {
            suggestion: Some(s),
            ..
        } if s == "x" || s == "y"
    )));
}

#[test]
fn use_through_pointer_member_inserts_intermediate_access() {
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);
    let vec2_ptr = c.types.pointer_to(vec2_ty);
    let u32_ = c.types.basic.u32_;

    // struct Entity { id: u32, use pos: ^Vec2 }
    let outer = c.types.new_struct(StructType {
        name: "Entity".to_string(),
        status: StructStatus::Pending,
        members: vec![
            StructMember {
                name: "id".to_string(),
                ty: u32_,
                idx: 0,
                offset: 0,
                initial_value: None,
                used: false,
                use_through_pointer_index: None,
            },
            StructMember {
                name: "pos".to_string(),
                ty: vec2_ptr,
                idx: 1,
                offset: 8,
                initial_value: None,
                used: true,
                use_through_pointer_index: None,
            },
        ],
        source_member_count: 2,
        polymorph_of: None,
        poly_sln: vec![],
        ast_node: None,
        scope: None,
    });
    assert!(c.types.struct_member_apply_use(outer, 1));
    if let Some(st) = c.types.struct_type_mut(outer) {
        st.status = StructStatus::UsesDone;
    }

    let e = c.ast.local("e");
    c.ast.node_mut(e).ty = Some(outer);
    let access = c.ast.field_access(e, "x");
    expr_entity(&mut c, access);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(access).ty, Some(c.types.basic.f32_));

    // The access now reads through the `pos` pointer member.
    if let NodeKind::FieldAccess(def) = &c.ast.node(access).kind {
        match &c.ast.node(def.expr).kind {
            NodeKind::FieldAccess(inner) => {
                assert_eq!(inner.field, "pos");
                assert_eq!(c.ast.node(def.expr).ty, Some(vec2_ptr));
            }
            other => panic!("expected intermediate access, got {}", other.name()),
        }
    }
}

#[test]
fn slice_like_subscript_lowers_to_data_access_and_ranges_make_slices() {
    let mut c = Checker::new();
    let f64_ = c.types.basic.f64_;
    let slice_ty = c.types.slice_of(f64_);

    let s = c.ast.local("s");
    c.ast.node_mut(s).ty = Some(slice_ty);
    let idx = c.ast.int(3);
    let sub = c.ast.subscript(s, idx);
    expr_entity(&mut c, sub);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(sub).ty, Some(f64_));
    if let NodeKind::Subscript(def) = &c.ast.node(sub).kind {
        assert!(matches!(
            c.ast.node(def.addr).kind,
            NodeKind::FieldAccess(_)
        ));
        assert_eq!(def.elem_size, Some(8));
    } else {
        panic!("subscript was rewritten unexpectedly");
    }

    // Indexing with a range produces a slice node and a slice type.
    let mut c = Checker::new();
    let f64_ = c.types.basic.f64_;
    let array_ty = c.types.array_of(f64_, 8);
    let a = c.ast.local("a");
    c.ast.node_mut(a).ty = Some(array_ty);
    let low = c.ast.int(1);
    let high = c.ast.int(4);
    let range = c.ast.range(low, high);
    let sub = c.ast.subscript(a, range);
    expr_entity(&mut c, sub);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    let slice_ty = c.types.slice_of(f64_);
    assert_eq!(c.ast.node(sub).ty, Some(slice_ty));
    assert!(matches!(c.ast.node(sub).kind, NodeKind::Slice { .. }));
}

#[test]
fn address_of_and_dereference() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;

    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(i32_);
    let aof = c.ast.address_of(x);
    expr_entity(&mut c, aof);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    let i32_ptr = c.types.pointer_to(i32_);
    assert_eq!(c.ast.node(aof).ty, Some(i32_ptr));
    assert!(c.ast.node(x).flags.contains(NodeFlags::ADDRESS_TAKEN));

    // Dereferencing rawptr is rejected.
    let mut c = Checker::new();
    let p = c.ast.local("p");
    let rawptr = c.types.basic.rawptr;
    c.ast.node_mut(p).ty = Some(rawptr);
    let deref = c.ast.dereference(p);
    expr_entity(&mut c, deref);
    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| matches!(d.error, CheckError::DerefRawptr)));
}

#[test]
fn address_of_non_lvalue_is_rejected() {
    let mut c = Checker::new();
    let two = c.ast.int(2);
    let three = c.ast.int(3);
    let sum = c.ast.binary(BinaryOp::Add, two, three);
    let aof = c.ast.address_of(sum);
    expr_entity(&mut c, aof);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| matches!(d.error, CheckError::NotAddressable(_))));
}

#[test]
fn if_expression_requires_bool_and_compatible_arms() {
    let mut c = Checker::new();
    let cond = c.ast.bool_lit(true);
    let one = c.ast.int(1);
    let two = c.ast.int(2);
    let if_expr = c.ast.alloc(Node::new(NodeKind::IfExpression {
        cond,
        true_expr: one,
        false_expr: two,
    }));
    let sink = c.ast.local("r");
    let assign = c.ast.binary(BinaryOp::Assign, sink, if_expr);
    function_with_body(&mut c, vec![assign]);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(if_expr).ty, Some(c.types.basic.i32_));

    // Mismatched arms are an error.
    let mut c = Checker::new();
    let cond = c.ast.bool_lit(false);
    let one = c.ast.int(1);
    let lit = c.ast.str_lit("two");
    let if_expr = c.ast.alloc(Node::new(NodeKind::IfExpression {
        cond,
        true_expr: one,
        false_expr: lit,
    }));
    let sink = c.ast.local("r");
    let assign = c.ast.binary(BinaryOp::Assign, sink, if_expr);
    function_with_body(&mut c, vec![assign]);
    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("Mismatched types for if-expression")));
}

#[test]
fn cast_legality() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;
    let f64_ = c.types.basic.f64_;

    let x = c.ast.local("x");
    c.ast.node_mut(x).ty = Some(i32_);
    let cast = c.ast.unary(UnaryOp::Cast, x);
    c.ast.node_mut(cast).ty = Some(f64_);
    expr_entity(&mut c, cast);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.ast.node(cast).ty, Some(f64_));

    // Struct-to-number casts are illegal.
    let mut c = Checker::new();
    let vec2_ty = vec2(&mut c);
    let v = c.ast.local("v");
    c.ast.node_mut(v).ty = Some(vec2_ty);
    let cast = c.ast.unary(UnaryOp::Cast, v);
    let i32_ = c.types.basic.i32_;
    c.ast.node_mut(cast).ty = Some(i32_);
    expr_entity(&mut c, cast);
    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| matches!(d.error, CheckError::BadCast(_))));
}

#[test]
fn sized_array_count_folds_to_a_literal() {
    let mut c = Checker::new();
    let u8_ = c.types.basic.u8_;
    let array_ty = c.types.array_of(u8_, 16);
    let a = c.ast.local("a");
    c.ast.node_mut(a).ty = Some(array_ty);
    let access = c.ast.field_access(a, "count");
    expr_entity(&mut c, access);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    match &c.ast.node(access).kind {
        NodeKind::NumLit {
            value: NumValue::Int(v),
        } => assert_eq!(*v, 16),
        other => panic!("expected folded count, got {}", other.name()),
    }
}
