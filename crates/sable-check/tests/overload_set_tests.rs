//! Overload sets, defaulted parameters, var-args classification, and the
//! process directives (`#export`, `#init`, `#library`).

use sable_ast::*;
use sable_check::{Checker, EntityKind, EntityState};

fn scheduled_fn(
    c: &mut Checker,
    name: &str,
    params: &[(&str, TypeId)],
    defaults: &[Option<i64>],
    ret: TypeId,
) -> NodeId {
    let mut def = FunctionDef::new(name);
    for (i, (pname, pty)) in params.iter().enumerate() {
        let local = c.ast.param(*pname);
        c.ast.node_mut(local).ty = Some(*pty);
        let default_value = defaults.get(i).copied().flatten().map(|v| {
            let lit = c.ast.int(v);
            lit
        });
        def.params.push(ParamDef {
            local,
            default_value,
            vararg_kind: VarArgKind::NotVA,
        });
    }
    let ret_node = c.ast.type_ref(ret);
    def.return_type_node = Some(ret_node);

    let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
    let header = c.entities.insert_with_state(
        EntityKind::FunctionHeader(func),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(func).entity = Some(header);
    if let NodeKind::Function(def) = &mut c.ast.node_mut(func).kind {
        def.entity_header = Some(header);
    }
    func
}

fn expr_entity(c: &mut Checker, node: NodeId) -> EntityId {
    let ent = c
        .entities
        .insert_with_state(EntityKind::Expression(node), None, EntityState::CheckTypes);
    c.ast.node_mut(node).entity = Some(ent);
    ent
}

#[test]
fn overload_set_picks_by_argument_type() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;
    let f64_ = c.types.basic.f64_;
    let void = c.types.basic.void;

    let f_int = scheduled_fn(&mut c, "f_int", &[("x", i32_)], &[], void);
    let f_float = scheduled_fn(&mut c, "f_float", &[("x", f64_)], &[], void);

    let set = c
        .ast
        .alloc(Node::new(NodeKind::OverloadedFunction(Box::new(
            OverloadedFunctionDef {
                name: "f".to_string(),
                overloads: vec![f_int, f_float],
            },
        ))));
    let set_ent = c.entities.insert_with_state(
        EntityKind::OverloadedFunction(set),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(set).entity = Some(set_ent);

    let half = c.ast.float(0.5);
    let call = c.ast.call(set, vec![half]);
    expr_entity(&mut c, call);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.entities.state(set_ent), EntityState::CodeGen);

    match &c.ast.node(call).kind {
        NodeKind::Call(def) => assert_eq!(def.callee, f_float),
        other => panic!("expected call, got {}", other.name()),
    }
}

#[test]
fn no_matching_overload_is_an_error() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;
    let void = c.types.basic.void;

    let f_int = scheduled_fn(&mut c, "f_int", &[("x", i32_)], &[], void);
    let set = c
        .ast
        .alloc(Node::new(NodeKind::OverloadedFunction(Box::new(
            OverloadedFunctionDef {
                name: "f".to_string(),
                overloads: vec![f_int],
            },
        ))));

    let s = c.ast.str_lit("nope");
    let call = c.ast.call(set, vec![s]);
    expr_entity(&mut c, call);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("overload")));
}

#[test]
fn defaulted_parameter_is_filled_in() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;

    let f = scheduled_fn(
        &mut c,
        "scale",
        &[("x", i32_), ("by", i32_)],
        &[None, Some(2)],
        i32_,
    );

    let ten = c.ast.int(10);
    let call = c.ast.call(f, vec![ten]);
    expr_entity(&mut c, call);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    match &c.ast.node(call).kind {
        NodeKind::Call(def) => {
            assert_eq!(def.args.values.len(), 2);
            let by = def.args.values[1].expect("default filled in");
            assert!(matches!(
                c.ast.node(by).kind,
                NodeKind::NumLit {
                    value: NumValue::Int(2)
                }
            ));
        }
        other => panic!("expected call, got {}", other.name()),
    }
}

#[test]
fn typed_varargs_classify_and_check() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;
    let void = c.types.basic.void;
    let va = c.types.varargs_of(i32_);

    let mut def = FunctionDef::new("sum");
    let local = c.ast.param("xs");
    c.ast.node_mut(local).ty = Some(va);
    def.params.push(ParamDef {
        local,
        default_value: None,
        vararg_kind: VarArgKind::Typed,
    });
    let ret_node = c.ast.type_ref(void);
    def.return_type_node = Some(ret_node);
    let func = c.ast.alloc(Node::new(NodeKind::Function(Box::new(def))));
    let header = c.entities.insert_with_state(
        EntityKind::FunctionHeader(func),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(func).entity = Some(header);
    if let NodeKind::Function(fd) = &mut c.ast.node_mut(func).kind {
        fd.entity_header = Some(header);
    }

    let one = c.ast.int(1);
    let two = c.ast.int(2);
    let three = c.ast.int(3);
    let call = c.ast.call(func, vec![one, two, three]);
    expr_entity(&mut c, call);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());

    match &c.ast.node(call).kind {
        NodeKind::Call(def) => assert_eq!(def.va_kind, Some(VarArgKind::Typed)),
        other => panic!("expected call, got {}", other.name()),
    }
    assert_eq!(c.ast.node(one).ty, Some(i32_));
}

#[test]
fn export_name_must_be_a_string_literal() {
    let mut c = Checker::new();
    let i32_ = c.types.basic.i32_;

    let target = c.ast.local("g");
    c.ast.node_mut(target).ty = Some(i32_);
    let name = c.ast.int(3);
    let export = c
        .ast
        .alloc(Node::new(NodeKind::DirectiveExport(Box::new(ExportDef {
            target,
            name_expr: name,
            resolved_name: None,
        }))));
    let ent = c.entities.insert_with_state(
        EntityKind::ProcessDirective(export),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(export).entity = Some(ent);

    c.run();
    assert!(c
        .sink
        .errors()
        .any(|d| d.error.to_string().contains("string literal")));
}

#[test]
fn init_directive_waits_for_dependencies_and_registers() {
    let mut c = Checker::new();
    let void = c.types.basic.void;

    let dep_fn = scheduled_fn(&mut c, "early", &[], &[], void);
    let dep = c
        .ast
        .alloc(Node::new(NodeKind::DirectiveInit(Box::new(InitDef {
            proc: dep_fn,
            dependencies: vec![],
        }))));
    let dep_ent = c.entities.insert_with_state(
        EntityKind::ProcessDirective(dep),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(dep).entity = Some(dep_ent);

    let init_fn = scheduled_fn(&mut c, "late", &[], &[], void);
    let init = c
        .ast
        .alloc(Node::new(NodeKind::DirectiveInit(Box::new(InitDef {
            proc: init_fn,
            dependencies: vec![dep],
        }))));
    let init_ent = c.entities.insert_with_state(
        EntityKind::ProcessDirective(init),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(init).entity = Some(init_ent);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    assert_eq!(c.entities.state(dep_ent), EntityState::Finalized);
    assert_eq!(c.entities.state(init_ent), EntityState::Finalized);
    assert_eq!(c.init_procedures, vec![dep_fn, init_fn]);
}

#[test]
fn library_name_processes_escapes() {
    let mut c = Checker::new();
    let name = c.ast.str_lit(r"vendor\\libfoo");
    let lib = c.ast.alloc(Node::new(NodeKind::DirectiveLibrary {
        name_expr: name,
        resolved_name: None,
    }));
    let ent = c.entities.insert_with_state(
        EntityKind::ProcessDirective(lib),
        None,
        EntityState::CheckTypes,
    );
    c.ast.node_mut(lib).entity = Some(ent);

    let summary = c.run();
    assert_eq!(summary.errors, 0, "{:?}", c.sink.diagnostics());
    match &c.ast.node(lib).kind {
        NodeKind::DirectiveLibrary { resolved_name, .. } => {
            assert_eq!(resolved_name.as_deref(), Some(r"vendor\libfoo"));
        }
        other => panic!("expected library directive, got {}", other.name()),
    }
}
