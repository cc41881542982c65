//! Whole-pass tests over hand-built modules

use crate::action::{PREV_FIELD, TRACE_FIELD};
use crate::rewrite::record_field;
use crate::*;
use unnest_ir::visit::{count_nested_functions, stmt_contains_var};
use unnest_ir::*;
use unnest_types::{ClassKind, ClassRef, ModuleName, QualifiedName, Signature, Type};

// ---- fixtures ----

fn m() -> ModuleName {
    ModuleName::new("m")
}

fn q(name: &str) -> QualifiedName {
    QualifiedName::new(&m(), name)
}

fn int_var(name: &str) -> Rval {
    Rval::var(q(name), Type::Int)
}

fn list_ty() -> Type {
    Type::Value("list".to_string())
}

fn local(name: &str, ty: Type, init: Initializer) -> Defn {
    Defn::data(
        name,
        DeclFlags::local_var(),
        DataDefn {
            ty,
            init,
            gc: GcStatement::None,
        },
        Context::default(),
    )
}

fn gc_trace_call(name: &str, ty: Type) -> Stmt {
    let signature = Signature::new(vec![Type::TypeInfo, Type::Generic.ptr_to()], vec![]);
    Stmt::Call(CallStmt {
        signature: signature.clone(),
        callee: Rval::Const(Const::CodeAddr {
            module: ModuleName::private_builtin(),
            name: FunctionName::new(GC_TRACE, 0),
            signature,
        }),
        object: None,
        args: vec![
            Rval::Const(Const::TypeDescriptor("list".to_string())),
            Rval::mem_addr(Lval::var(q(name), ty)),
        ],
        results: vec![],
        kind: CallKind::Ordinary,
    })
}

fn traced_local(name: &str, ty: Type) -> Defn {
    let gc = GcStatement::Trace(gc_trace_call(name, ty.clone()));
    Defn::data(
        name,
        DeclFlags::local_var(),
        DataDefn {
            ty,
            init: Initializer::None,
            gc,
        },
        Context::default(),
    )
}

fn env_ptr_arg() -> Argument {
    Argument {
        name: ENV_PTR_ARG.to_string(),
        ty: Type::GenericEnvPtr,
        gc: GcStatement::None,
    }
}

fn int_arg(name: &str) -> Argument {
    Argument {
        name: name.to_string(),
        ty: Type::Int,
        gc: GcStatement::None,
    }
}

fn nested_fn(label: &str, args: Vec<Argument>, body: Stmt) -> Defn {
    Defn::function(
        FunctionName::new(label, 0),
        DeclFlags::nested_function(),
        FunctionDefn {
            params: Params {
                args,
                returns: vec![Type::Int],
            },
            body: Some(body),
        },
        Context::default(),
    )
}

fn top_fn(label: &str, args: Vec<Argument>, returns: Vec<Type>, body: Stmt) -> Defn {
    Defn::function(
        FunctionName::new(label, 0),
        DeclFlags {
            access: Access::Exported,
            storage: Storage::PerInstance,
            constness: Constness::Modifiable,
        },
        FunctionDefn {
            params: Params { args, returns },
            body: Some(body),
        },
        Context::new("m.src", 1),
    )
}

fn block(defns: Vec<Defn>, stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block {
        defns,
        stmts,
        context: Context::default(),
    }
}

fn call(label: &str, args: Vec<Rval>, results: Vec<Lval>, kind: CallKind) -> Stmt {
    let signature = Signature::new(args.iter().map(|_| Type::Generic).collect(), vec![]);
    Stmt::Call(CallStmt {
        signature: signature.clone(),
        callee: Rval::Const(Const::CodeAddr {
            module: m(),
            name: FunctionName::new(label, 0),
            signature,
        }),
        object: None,
        args,
        results,
        kind,
    })
}

/// Call of a nested function, passing the environment pointer
fn call_nested(label: &str) -> Stmt {
    call(
        label,
        vec![Rval::var(q(ENV_PTR), Type::Unknown)],
        vec![Lval::var(q("r"), Type::Int)],
        CallKind::Ordinary,
    )
}

fn module(defns: Vec<Defn>) -> Module {
    Module {
        name: m(),
        imports: vec![],
        defns,
    }
}

fn c_config() -> TargetConfig {
    TargetConfig::for_target(Target::C)
}

fn hoist(module: Module) -> Module {
    transform(Action::HoistNestedFuncs, &c_config(), module).unwrap()
}

fn chain(module: Module) -> Module {
    transform(Action::ChainGcStackFrames, &c_config(), module).unwrap()
}

fn names(module: &Module) -> Vec<String> {
    module.defns.iter().map(|d| d.name.to_string()).collect()
}

fn find<'a>(module: &'a Module, name: &str) -> &'a Defn {
    module
        .defns
        .iter()
        .find(|d| d.name.to_string() == name)
        .unwrap_or_else(|| panic!("no definition `{}`", name))
}

fn body<'a>(module: &'a Module, name: &str) -> &'a Stmt {
    find(module, name).as_function().unwrap().body.as_ref().unwrap()
}

fn block_parts(stmt: &Stmt) -> (&[Defn], &[Stmt]) {
    match stmt {
        Stmt::Block { defns, stmts, .. } => (defns, stmts),
        other => panic!("expected a block, got {:?}", other),
    }
}

fn record_members(module: &Module, name: &str) -> Vec<String> {
    match &find(module, name).body {
        DefnBody::Class(class) => class.members.iter().map(|d| d.name.to_string()).collect(),
        other => panic!("expected a class, got {:?}", other),
    }
}

fn env_ptr_ty() -> Type {
    Type::Class(ClassRef {
        name: q("f_0_env"),
        kind: ClassKind::Struct,
    })
    .ptr_to()
}

fn frame_ptr_ty() -> Type {
    Type::Class(ClassRef {
        name: q("f_0_frame"),
        kind: ClassKind::Struct,
    })
    .ptr_to()
}

fn env_field(field: &str, ty: Type) -> Lval {
    record_field(&m(), ENV_PTR, &env_ptr_ty(), field, &ty)
}

fn frame_field(field: &str, ty: Type) -> Lval {
    record_field(&m(), FRAME_PTR, &frame_ptr_ty(), field, &ty)
}

/// f { int x = 1; g() { return x; }  r = g(env_ptr); return x; }
fn simple_capture() -> Module {
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("x")]));
    let f_body = block(
        vec![local("x", Type::Int, Initializer::Single(Rval::int(1))), g],
        vec![call_nested("g"), Stmt::Return(vec![int_var("x")])],
    );
    module(vec![top_fn("f", vec![], vec![Type::Int], f_body)])
}

// ---- hoisting ----

#[test]
fn test_hoist_simple_capture() {
    let out = hoist(simple_capture());
    assert_eq!(names(&out), vec!["f_0_env/0", "g_0", "f_0"]);
    assert_eq!(record_members(&out, "f_0_env/0"), vec!["x"]);

    let ptr_decl = Defn::data(
        ENV_PTR,
        DeclFlags::local_var(),
        DataDefn {
            ty: env_ptr_ty(),
            init: Initializer::None,
            gc: GcStatement::None,
        },
        Context::default(),
    );
    let read_x = Rval::lval(env_field("x", Type::Int));

    // The hoisted function casts its generic environment argument
    let g = find(&out, "g_0");
    assert_eq!(g.flags, DeclFlags::private_one_copy());
    let expected_g_body = Stmt::Block {
        defns: vec![ptr_decl.clone()],
        stmts: vec![
            Stmt::assign(
                Lval::var(q(ENV_PTR), env_ptr_ty()),
                Rval::cast(env_ptr_ty(), Rval::var(q(ENV_PTR_ARG), Type::GenericEnvPtr)),
            ),
            Stmt::Return(vec![read_x.clone()]),
        ],
        context: Context::default(),
    };
    assert_eq!(g.as_function().unwrap().body.as_ref(), Some(&expected_g_body));

    // The outer function sets up the record, then runs the flattened body
    let record_ty = Type::Class(ClassRef {
        name: q("f_0_env"),
        kind: ClassKind::Struct,
    });
    let holder = local("env", record_ty.clone(), Initializer::None);
    let mut call_g = call_nested("g");
    if let Stmt::Call(call) = &mut call_g {
        call.args = vec![Rval::var(q(ENV_PTR), env_ptr_ty())];
    }
    let expected_f_body = Stmt::Block {
        defns: vec![
            Defn {
                context: Context::new("m.src", 1),
                ..holder
            },
            Defn {
                context: Context::new("m.src", 1),
                ..ptr_decl
            },
        ],
        stmts: vec![
            Stmt::assign(
                Lval::var(q(ENV_PTR), env_ptr_ty()),
                Rval::mem_addr(Lval::var(q("env"), record_ty)),
            ),
            block(
                vec![],
                vec![
                    Stmt::assign(env_field("x", Type::Int), Rval::int(1)),
                    call_g,
                    Stmt::Return(vec![read_x]),
                ],
            ),
        ],
        context: Context::new("m.src", 1),
    };
    assert_eq!(body(&out, "f_0"), &expected_f_body);
}

#[test]
fn test_trivial_nested_function_only_changes_flags() {
    // g only reads its own parameter
    let g_body = Stmt::Return(vec![int_var("a")]);
    let g = nested_fn("g", vec![env_ptr_arg(), int_arg("a")], g_body.clone());
    let f_body = block(vec![local("y", Type::Int, Initializer::None), g], vec![call_nested("g")]);
    let out = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    assert_eq!(names(&out), vec!["g_0", "f_0"]);
    let g = find(&out, "g_0");
    assert_eq!(g.flags, DeclFlags::private_one_copy());
    assert_eq!(g.as_function().unwrap().body.as_ref(), Some(&g_body));

    // No record, so the environment argument is null
    let f = body(&out, "f_0");
    assert!(!stmt_contains_var(f, &q(ENV_PTR)));
    let (_, stmts) = block_parts(f);
    match &stmts[0] {
        Stmt::Call(call) => assert_eq!(call.args, vec![Rval::Const(Const::Null(Type::GenericEnvPtr))]),
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn test_three_levels_flatten_into_one_record() {
    // f { x; g { y; h { x + y } } }
    let h = nested_fn(
        "h",
        vec![env_ptr_arg()],
        Stmt::Return(vec![Rval::Binop(
            Binop::Add,
            Box::new(int_var("x")),
            Box::new(int_var("y")),
        )]),
    );
    let g = nested_fn(
        "g",
        vec![env_ptr_arg()],
        block(vec![local("y", Type::Int, Initializer::Single(Rval::int(2))), h], vec![call_nested("h")]),
    );
    let f_body = block(vec![local("x", Type::Int, Initializer::Single(Rval::int(1))), g], vec![call_nested("g")]);
    let out = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    assert_eq!(names(&out), vec!["f_0_env/0", "h_0", "g_0", "f_0"]);
    assert_eq!(record_members(&out, "f_0_env/0"), vec!["x", "y"]);
    assert!(check_module(&out).is_empty());
    for name in ["h_0", "g_0", "f_0"] {
        let body = body(&out, name);
        assert_eq!(count_nested_functions(body), 0);
        assert!(!stmt_contains_var(body, &q("x")), "{} reads x directly", name);
        assert!(!stmt_contains_var(body, &q("y")), "{} reads y directly", name);
    }
}

#[test]
fn test_unneeded_function_is_untouched() {
    let f_body = block(
        vec![local("x", Type::Int, Initializer::Single(Rval::int(1)))],
        vec![
            Stmt::assign(Lval::var(q("x"), Type::Int), Rval::int(2)),
            Stmt::Return(vec![int_var("x")]),
        ],
    );
    let input = module(vec![top_fn("f", vec![], vec![Type::Int], f_body)]);
    assert_eq!(hoist(input.clone()), input);
}

#[test]
fn test_hoist_is_idempotent() {
    let once = hoist(simple_capture());
    let twice = hoist(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn test_output_is_deterministic() {
    let first = hoist(simple_capture());
    let second = hoist(simple_capture());
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first, second);
}

#[test]
fn test_static_constants_move_to_module_scope() {
    let table = Defn::data(
        "table",
        DeclFlags::local_static_const(),
        DataDefn {
            ty: Type::Array(Box::new(Type::Int)),
            init: Initializer::Array(vec![Initializer::Single(Rval::int(1))]),
            gc: GcStatement::None,
        },
        Context::default(),
    );
    let f_body = block(vec![table], vec![Stmt::Return(vec![])]);
    let out = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    assert_eq!(names(&out), vec!["table", "f_0"]);
    let table = find(&out, "table");
    assert_eq!(table.flags.access, Access::Private);
    assert!(table.is_static_const());
    let (defns, _) = block_parts(body(&out, "f_0"));
    assert!(defns.is_empty());
}

#[test]
fn test_captured_argument_copied_after_pointer_setup() {
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("a")]));
    let f_body = block(vec![g], vec![call_nested("g")]);
    let out = hoist(module(vec![top_fn("f", vec![int_arg("a")], vec![], f_body)]));

    assert_eq!(record_members(&out, "f_0_env/0"), vec!["a"]);
    let (_, stmts) = block_parts(body(&out, "f_0"));
    assert!(matches!(&stmts[0], Stmt::Atomic(AtomicStmt::Assign(lval, _)) if lval.var_name() == Some(&q(ENV_PTR))));
    assert_eq!(stmts[1], Stmt::assign(env_field("a", Type::Int), int_var("a")));
}

#[test]
fn test_later_initializers_wait_for_captured_ones() {
    // x is captured; y and z read it (directly and through y); w does not
    let plus_one = Rval::Binop(Binop::Add, Box::new(int_var("x")), Box::new(Rval::int(1)));
    let twice_y = Rval::Binop(Binop::Mul, Box::new(int_var("y")), Box::new(Rval::int(2)));
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("x")]));
    let f_body = block(
        vec![
            local("x", Type::Int, Initializer::Single(Rval::int(1))),
            local("y", Type::Int, Initializer::Single(plus_one)),
            local("z", Type::Int, Initializer::Single(twice_y.clone())),
            local("w", Type::Int, Initializer::Single(Rval::int(5))),
            g,
        ],
        vec![],
    );
    let out = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    let (_, outer) = block_parts(body(&out, "f_0"));
    let (defns, stmts) = block_parts(outer.last().unwrap());
    let inits: Vec<_> = defns
        .iter()
        .map(|d| (d.name.to_string(), d.as_data().unwrap().init.clone()))
        .collect();
    assert_eq!(
        inits,
        vec![
            ("y".to_string(), Initializer::None),
            ("z".to_string(), Initializer::None),
            ("w".to_string(), Initializer::Single(Rval::int(5))),
        ]
    );
    let read_x = Rval::lval(env_field("x", Type::Int));
    assert_eq!(
        stmts,
        &[
            Stmt::assign(env_field("x", Type::Int), Rval::int(1)),
            Stmt::assign(
                Lval::var(q("y"), Type::Int),
                Rval::Binop(Binop::Add, Box::new(read_x), Box::new(Rval::int(1))),
            ),
            Stmt::assign(Lval::var(q("z"), Type::Int), twice_y),
        ]
    );
}

// ---- invariant violations ----

#[test]
fn test_compound_initializer_reading_deferred_local_rejected() {
    // x's initializer becomes an assignment after the declarations, so `a`
    // would read the field before it is set
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("x")]));
    let f_body = block(
        vec![
            local("x", Type::Int, Initializer::Single(Rval::int(1))),
            local(
                "a",
                Type::Array(Box::new(Type::Int)),
                Initializer::Array(vec![Initializer::Single(int_var("x"))]),
            ),
            g,
        ],
        vec![],
    );
    let err = transform(
        Action::HoistNestedFuncs,
        &c_config(),
        module(vec![top_fn("f", vec![], vec![], f_body)]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ElimError::CompoundInitializerReadsCaptured { ref name, ref reads, .. } if name == "a" && reads == "x"
    ));
}

#[test]
fn test_compound_initializer_not_reading_deferred_local_kept() {
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("x")]));
    let table = Initializer::Array(vec![Initializer::Single(Rval::int(7))]);
    let f_body = block(
        vec![
            local("x", Type::Int, Initializer::Single(Rval::int(1))),
            local("a", Type::Array(Box::new(Type::Int)), table.clone()),
            g,
        ],
        vec![],
    );
    let out = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    let (_, outer) = block_parts(body(&out, "f_0"));
    let (defns, _) = block_parts(outer.last().unwrap());
    assert_eq!(defns.len(), 1);
    assert_eq!(defns[0].as_data().unwrap().init, table);
}

#[test]
fn test_nested_class_rejected() {
    let class = Defn {
        name: EntityName::Type {
            name: "point".to_string(),
            arity: 0,
        },
        context: Context::new("m.src", 7),
        flags: DeclFlags::local_var(),
        body: DefnBody::Class(ClassDefn {
            kind: ClassKind::Struct,
            members: vec![],
        }),
    };
    let f_body = block(vec![class], vec![]);
    let err = transform(
        Action::HoistNestedFuncs,
        &c_config(),
        module(vec![top_fn("f", vec![], vec![], f_body)]),
    )
    .unwrap_err();
    assert!(matches!(err, ElimError::NestedClass { .. }));
    assert_eq!(err.context(), &Context::new("m.src", 7));
}

#[test]
fn test_compound_initializer_on_captured_local_rejected() {
    let pair = Initializer::Struct(Type::Generic, vec![Initializer::Single(Rval::int(1))]);
    let g = nested_fn("g", vec![env_ptr_arg()], Stmt::Return(vec![int_var("p")]));
    let f_body = block(vec![local("p", Type::Generic, pair), g], vec![]);
    let err = transform(
        Action::HoistNestedFuncs,
        &c_config(),
        module(vec![top_fn("f", vec![], vec![], f_body)]),
    )
    .unwrap_err();
    assert!(matches!(err, ElimError::UnsupportedCapturedInitializer { ref name, .. } if name == "p"));
}

#[test]
fn test_duplicate_capture_rejected() {
    let scope = |label: &str| {
        block(
            vec![
                local("x", Type::Int, Initializer::None),
                nested_fn(label, vec![env_ptr_arg()], Stmt::Return(vec![int_var("x")])),
            ],
            vec![],
        )
    };
    let f_body = block(vec![], vec![scope("g"), scope("h")]);
    let err = transform(
        Action::HoistNestedFuncs,
        &c_config(),
        module(vec![top_fn("f", vec![], vec![], f_body)]),
    )
    .unwrap_err();
    assert!(matches!(err, ElimError::DuplicateCapture { ref name, .. } if name == "x"));
}

#[test]
fn test_missing_env_ptr_arg_rejected() {
    let g = nested_fn("g", vec![], Stmt::Return(vec![int_var("x")]));
    let f_body = block(vec![local("x", Type::Int, Initializer::None), g], vec![]);
    let err = transform(
        Action::HoistNestedFuncs,
        &c_config(),
        module(vec![top_fn("f", vec![], vec![], f_body)]),
    )
    .unwrap_err();
    assert!(matches!(err, ElimError::MissingEnvPtrArg { ref name, .. } if name == "g_0"));
}

// ---- chaining ----

/// f() -> int { list l (traced); if (c) return 0; else tail h(l); return 1; }
fn chained_exits() -> Module {
    let f_body = block(
        vec![traced_local("l", list_ty()), local("r", Type::Int, Initializer::None)],
        vec![
            Stmt::If {
                cond: Rval::Const(Const::Bool(true)),
                then_branch: Box::new(Stmt::Return(vec![Rval::int(0)])),
                else_branch: Some(Box::new(call(
                    "h",
                    vec![Rval::var(q("l"), list_ty())],
                    vec![Lval::var(q("r"), Type::Int)],
                    CallKind::Tail,
                ))),
            },
            Stmt::Return(vec![Rval::int(1)]),
        ],
    );
    module(vec![top_fn("f", vec![], vec![Type::Int], f_body)])
}

#[test]
fn test_chain_frame_layout_and_link() {
    let out = chain(chained_exits());
    assert_eq!(names(&out), vec!["f_0_frame/0", "f_gc_trace_0", "f_0"]);
    assert_eq!(record_members(&out, "f_0_frame/0"), vec![PREV_FIELD, TRACE_FIELD, "l"]);

    let (decls, stmts) = block_parts(body(&out, "f_0"));
    // Partial initializer: header values, the rest zeroed
    let holder = decls[0].as_data().unwrap();
    match &holder.init {
        Initializer::Struct(_, fields) => {
            assert_eq!(fields.len(), 2);
            assert_eq!(fields[0], Initializer::Single(Rval::lval(stack_chain_var())));
        }
        other => panic!("expected a struct initializer, got {:?}", other),
    }
    assert_eq!(decls[1].data_name(), Some(FRAME_PTR));
    assert_eq!(
        stmts[1],
        Stmt::assign(
            stack_chain_var(),
            Rval::cast(Type::GenericEnvPtr, Rval::var(q(FRAME_PTR), frame_ptr_ty())),
        )
    );
}

#[test]
fn test_chain_unlinks_before_every_exit() {
    let out = chain(chained_exits());
    assert!(check_module(&out).is_empty(), "{:?}", check_module(&out));

    let unlink = Stmt::assign(stack_chain_var(), Rval::lval(frame_field(PREV_FIELD, Type::GenericEnvPtr)));
    let (_, stmts) = block_parts(body(&out, "f_0"));
    let (_, inner) = block_parts(stmts.last().unwrap());
    match &inner[0] {
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            let (_, then_stmts) = block_parts(then_branch);
            assert_eq!(then_stmts[0], unlink);
            assert_eq!(then_stmts[1], Stmt::Return(vec![Rval::int(0)]));

            let (_, else_stmts) = block_parts(else_branch.as_ref().unwrap());
            assert_eq!(else_stmts.len(), 3);
            assert_eq!(else_stmts[0], unlink);
            assert!(matches!(&else_stmts[1], Stmt::Call(c) if c.kind == CallKind::Tail));
            assert_eq!(else_stmts[2], Stmt::Return(vec![int_var("r")]));
        }
        other => panic!("expected an if, got {:?}", other),
    }
    // Returns a value, so nothing is appended after the body
    assert!(matches!(stmts.last(), Some(Stmt::Block { .. })));
}

#[test]
fn test_chain_unlinks_at_fall_off_end() {
    let f_body = block(
        vec![traced_local("l", list_ty())],
        vec![call("p", vec![], vec![], CallKind::NoReturn)],
    );
    let out = chain(module(vec![top_fn("f", vec![], vec![], f_body)]));
    assert!(check_module(&out).is_empty(), "{:?}", check_module(&out));

    let unlink = Stmt::assign(stack_chain_var(), Rval::lval(frame_field(PREV_FIELD, Type::GenericEnvPtr)));
    let (_, stmts) = block_parts(body(&out, "f_0"));
    assert_eq!(stmts.last(), Some(&unlink));
}

#[test]
fn test_try_commit_saves_and_restores_chain() {
    let try_commit = |inner: Stmt| Stmt::TryCommit {
        reference: Lval::var(q("commit"), Type::CommitRef),
        protected: Box::new(inner),
        handler: Box::new(Stmt::comment("committed")),
    };
    let f_body = block(
        vec![traced_local("l", list_ty())],
        vec![try_commit(try_commit(call("p", vec![], vec![], CallKind::Ordinary)))],
    );
    let out = chain(module(vec![top_fn("f", vec![], vec![], f_body)]));
    assert_eq!(
        record_members(&out, "f_0_frame/0"),
        vec![PREV_FIELD, TRACE_FIELD, "l", "saved_stack_chain_0", "saved_stack_chain_1"]
    );

    let (_, stmts) = block_parts(body(&out, "f_0"));
    let (_, inner) = block_parts(&stmts[2]);
    let saved = frame_field("saved_stack_chain_0", Type::GenericEnvPtr);
    match &inner[0] {
        Stmt::TryCommit {
            protected, handler, ..
        } => {
            let (_, protected) = block_parts(protected);
            assert_eq!(protected[0], Stmt::assign(saved.clone(), Rval::lval(stack_chain_var())));
            let (_, handler) = block_parts(handler);
            assert_eq!(handler[0], Stmt::assign(stack_chain_var(), Rval::lval(saved)));
        }
        other => panic!("expected a try-commit, got {:?}", other),
    }
}

#[test]
fn test_trace_function_runs_initialisers_first() {
    let type_info = Defn::data(
        "ti",
        DeclFlags::local_var(),
        DataDefn {
            ty: Type::TypeInfo,
            init: Initializer::None,
            gc: GcStatement::Initialiser(Stmt::assign(
                Lval::var(q("ti"), Type::TypeInfo),
                Rval::Const(Const::TypeDescriptor("list".to_string())),
            )),
        },
        Context::default(),
    );
    let counter = traced_local("n", Type::Int);
    let f_body = block(vec![traced_local("l", list_ty()), counter, type_info], vec![]);
    let out = chain(module(vec![top_fn("f", vec![], vec![], f_body)]));

    let (decls, stmts) = block_parts(body(&out, "f_gc_trace_0"));
    assert_eq!(decls[0].data_name(), Some(FRAME_PTR));
    assert_eq!(stmts.len(), 3, "the int field is not traced");
    assert_eq!(
        stmts[0],
        Stmt::assign(
            Lval::var(q(FRAME_PTR), frame_ptr_ty()),
            Rval::cast(frame_ptr_ty(), Rval::var(q(THIS_FRAME), Type::GenericEnvPtr)),
        )
    );
    assert_eq!(
        stmts[1],
        Stmt::assign(
            frame_field("ti", Type::TypeInfo),
            Rval::Const(Const::TypeDescriptor("list".to_string())),
        )
    );
    match &stmts[2] {
        Stmt::Call(call) => assert_eq!(call.args[1], Rval::mem_addr(frame_field("l", list_ty()))),
        other => panic!("expected a trace call, got {:?}", other),
    }

    let trace = find(&out, "f_gc_trace_0");
    assert_eq!(trace.as_function().unwrap().params.signature(), action::trace_signature());
}

#[test]
fn test_gc_trace_primitive_not_instrumented() {
    let tracer = Defn::function(
        FunctionName::new(GC_TRACE, 0),
        DeclFlags::private_one_copy(),
        FunctionDefn {
            params: Params {
                args: vec![],
                returns: vec![],
            },
            body: Some(block(vec![traced_local("l", list_ty())], vec![])),
        },
        Context::default(),
    );
    let input = Module {
        name: ModuleName::private_builtin(),
        imports: vec![],
        defns: vec![tracer],
    };
    let out = transform(Action::ChainGcStackFrames, &c_config(), input.clone()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_chain_without_traced_variables_is_untouched() {
    let f_body = block(
        vec![local("n", Type::Int, Initializer::Single(Rval::int(0)))],
        vec![Stmt::Return(vec![int_var("n")])],
    );
    let input = module(vec![top_fn("f", vec![], vec![Type::Int], f_body)]);
    assert_eq!(chain(input.clone()), input);
}

#[test]
fn test_heap_target_allocates_frame() {
    let config = TargetConfig::for_target(Target::Java);
    let out = transform(Action::ChainGcStackFrames, &config, chained_exits()).unwrap();

    let record_ty = Type::Class(ClassRef {
        name: q("f_0_frame"),
        kind: ClassKind::Class,
    });
    match &find(&out, "f_0_frame/0").body {
        DefnBody::Class(class) => assert_eq!(class.kind, ClassKind::Class),
        other => panic!("expected a class, got {:?}", other),
    }

    let (decls, stmts) = block_parts(body(&out, "f_0"));
    assert_eq!(decls.len(), 1, "no stack holder on the heap");
    assert_eq!(decls[0].as_data().unwrap().ty, record_ty);
    assert_eq!(
        stmts[0],
        Stmt::Atomic(AtomicStmt::NewObject {
            target: Lval::var(q(FRAME_PTR), record_ty.clone()),
            ty: record_ty.clone(),
            args: vec![],
            arg_types: vec![],
        })
    );
    let prev = record_field(&m(), FRAME_PTR, &record_ty, PREV_FIELD, &Type::GenericEnvPtr);
    assert_eq!(stmts[1], Stmt::assign(prev, Rval::lval(stack_chain_var())));
    assert!(check_module(&out).is_empty());
}

#[test]
fn test_explicit_zeroing_without_implicit_zero_init() {
    let config = TargetConfig {
        implicit_zero_init: false,
        ..c_config()
    };
    let out = transform(Action::ChainGcStackFrames, &config, chained_exits()).unwrap();

    let (decls, stmts) = block_parts(body(&out, "f_0"));
    assert_eq!(decls[0].as_data().unwrap().init, Initializer::None);
    assert_eq!(
        stmts[1],
        Stmt::assign(frame_field(PREV_FIELD, Type::GenericEnvPtr), Rval::lval(stack_chain_var()))
    );
    assert!(matches!(&stmts[2], Stmt::Atomic(AtomicStmt::Assign(lval, Rval::Const(Const::CodeAddr { .. })))
        if *lval == frame_field(TRACE_FIELD, Type::Func(Box::new(action::trace_signature())))));
    assert_eq!(
        stmts[3],
        Stmt::assign(frame_field("l", list_ty()), Rval::Const(Const::Zero(list_ty())))
    );
    // Linked last
    assert!(matches!(&stmts[4], Stmt::Atomic(AtomicStmt::Assign(lval, Rval::Cast(..))) if *lval == stack_chain_var()));
}

#[test]
fn test_hoist_then_chain_traces_record_through_pointer() {
    // f { list l (traced); g() { use l } }
    let g = nested_fn(
        "g",
        vec![env_ptr_arg()],
        block(vec![], vec![call("p", vec![Rval::var(q("l"), list_ty())], vec![], CallKind::Ordinary)]),
    );
    let f_body = block(vec![traced_local("l", list_ty()), g], vec![call_nested("g")]);
    let hoisted = hoist(module(vec![top_fn("f", vec![], vec![], f_body)]));

    // The record pointer carries l's trace obligation
    let (decls, _) = block_parts(body(&hoisted, "f_0"));
    assert!(matches!(decls[1].as_data().unwrap().gc, GcStatement::Trace(Stmt::If { .. })));

    let chained = chain(hoisted);
    assert_eq!(names(&chained), vec!["f_0_env/0", "g_0", "f_0_frame/0", "f_gc_trace_0", "f_0"]);
    assert_eq!(record_members(&chained, "f_0_frame/0"), vec![PREV_FIELD, TRACE_FIELD, ENV_PTR]);
    assert!(check_module(&chained).is_empty(), "{:?}", check_module(&chained));
}
