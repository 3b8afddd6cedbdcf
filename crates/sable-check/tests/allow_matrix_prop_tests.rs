//! Property tests for the operator allow-matrix, literal fitting, and
//! integer-switch range overlap detection.

use proptest::prelude::*;

use sable_ast::*;
use sable_check::{CheckError, Checker, EntityKind, EntityState};
use std::collections::HashMap;

fn arith_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Sub),
        Just(BinaryOp::Mul),
        Just(BinaryOp::Div),
        Just(BinaryOp::Mod),
        Just(BinaryOp::And),
        Just(BinaryOp::Or),
        Just(BinaryOp::Xor),
    ]
}

fn compare_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Equal),
        Just(BinaryOp::NotEqual),
        Just(BinaryOp::Less),
        Just(BinaryOp::LessEqual),
        Just(BinaryOp::Greater),
        Just(BinaryOp::GreaterEqual),
    ]
}

proptest! {
    // Integer operands accept the whole arithmetic/bitwise family and all
    // comparisons; booleans accept neither arithmetic nor ordering.
    #[test]
    fn integers_accept_arithmetic(op in arith_op()) {
        let c = Checker::new();
        prop_assert!(c.binary_op_is_allowed(op, c.types.basic.i32_));
        prop_assert!(!c.binary_op_is_allowed(op, c.types.basic.bool_));
    }

    #[test]
    fn comparisons_respect_ordering(op in compare_op()) {
        let c = Checker::new();
        prop_assert!(c.binary_op_is_allowed(op, c.types.basic.f32_));

        let equality_only = matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);
        prop_assert_eq!(
            c.binary_op_is_allowed(op, c.types.basic.bool_),
            equality_only
        );
    }

    // Floats reject the integer-only operations.
    #[test]
    fn floats_reject_integer_only_ops(
        op in prop_oneof![
            Just(BinaryOp::Mod),
            Just(BinaryOp::And),
            Just(BinaryOp::Or),
            Just(BinaryOp::Xor),
            Just(BinaryOp::Shl),
            Just(BinaryOp::Shr),
        ]
    ) {
        let c = Checker::new();
        prop_assert!(!c.binary_op_is_allowed(op, c.types.basic.f64_));
    }

    // Any two overlapping case ranges collide on at least one value, and
    // the collision is reported exactly once per duplicated value.
    #[test]
    fn overlapping_case_ranges_collide(
        a_low in -20i64..20,
        a_len in 0i64..10,
        offset in 0i64..5,
    ) {
        let a_high = a_low + a_len;
        let b_low = a_low + offset;

        let mut c = Checker::new();
        let scrutinee = c.ast.int(0);
        let low_a = c.ast.int(a_low);
        let high_a = c.ast.int(a_high);
        let range_a = c.ast.range(low_a, high_a);
        let block_a = c.ast.block(vec![]);
        let case_a = c.ast.alloc(Node::new(NodeKind::SwitchCase(Box::new(SwitchCaseDef {
            values: vec![range_a],
            block: block_a,
            is_default: false,
        }))));

        let value_b = c.ast.int(b_low);
        let block_b = c.ast.block(vec![]);
        let case_b = c.ast.alloc(Node::new(NodeKind::SwitchCase(Box::new(SwitchCaseDef {
            values: vec![value_b],
            block: block_b,
            is_default: false,
        }))));

        let case_block = c.ast.block(vec![case_a, case_b]);
        let sw = c.ast.alloc(Node::new(NodeKind::Switch(Box::new(SwitchDef {
            init: vec![],
            scrutinee,
            case_block,
            cases: None,
            default_case: None,
            switch_kind: None,
            case_map: HashMap::new(),
            min_case: i64::MAX,
            max_case: i64::MIN,
            case_exprs: vec![],
            yield_return_index: 0,
        }))));

        let mut def = FunctionDef::new("f");
        let body = c.ast.block(vec![sw]);
        def.body = Some(body);
        let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
        let header = c.entities.insert_with_state(
            EntityKind::FunctionHeader(func),
            None,
            EntityState::CheckTypes,
        );
        let body_ent = c
            .entities
            .insert_with_state(EntityKind::Function(func), None, EntityState::CheckTypes);
        c.ast.node_mut(func).entity = Some(header);
        if let NodeKind::Function(fd) = &mut c.ast.node_mut(func).kind {
            fd.entity_header = Some(header);
            fd.entity_body = Some(body_ent);
        }

        c.run();

        let overlaps = b_low <= a_high;
        let collisions = c
            .sink
            .errors()
            .filter(|d| matches!(d.error, CheckError::DuplicateCase(v) if v == b_low))
            .count();
        prop_assert_eq!(collisions, usize::from(overlaps));
    }

    // Unsized integer literals commit to any integer type they fit in, and
    // refuse the ones they do not.
    #[test]
    fn literal_fitting(v in -300i64..300) {
        use sable_check::TypeMatch;

        let mut c = Checker::new();
        let lit = c.ast.int(v);
        let unsized_int = c.types.basic.int_unsized;
        c.ast.node_mut(lit).ty = Some(unsized_int);

        let i8_ = c.types.basic.i8_;
        let fits_i8 = i8::try_from(v).is_ok();
        let outcome = c.unify_node_and_type(lit, i8_);
        prop_assert_eq!(outcome == TypeMatch::Success, fits_i8);
        if fits_i8 {
            prop_assert_eq!(c.ast.node(lit).ty, Some(i8_));
        }
    }
}
