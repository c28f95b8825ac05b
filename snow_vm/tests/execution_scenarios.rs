//! End-to-end execution scenarios: analyze, lower, emit, then run the
//! resulting `.water` text on the VM — the same chain `snow_cli::driver`
//! runs, just assembled by hand since this crate has no dependency on the
//! upstream stages.

use hashbrown::HashMap;
use snow_ast::{
    BinaryOp, Block, Constructor, Expr, ExprKind, FieldDef, Function, Item, ItemKind, Module, Param, Program, Stmt,
    StmtKind, StructDef, TypeExpr,
};
use snow_backend::{emitter, SlotMap};
use snow_common::{Span, Spanned};
use snow_ir::build_program;
use snow_semantic::Analyzer;
use snow_vm::core::Vm;
use snow_vm::parser::parse_program;
use snow_vm::value::Value;

fn sp(name: &str) -> Spanned<String> {
    Spanned::new(name.to_string(), Span::synthetic())
}

fn ident(name: &str) -> Expr {
    Expr { kind: Box::new(ExprKind::Identifier(name.to_string())), span: Span::synthetic(), id: 0 }
}

fn num(text: &str) -> Expr {
    Expr { kind: Box::new(ExprKind::NumberLiteral(text.to_string())), span: Span::synthetic(), id: 0 }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr { kind: Box::new(ExprKind::Binary { op, left, right }), span: Span::synthetic(), id: 0 }
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt { kind, span: Span::synthetic(), id: 0 }
}

fn run(program: &Program) -> Option<Value> {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(program).expect("program should analyze cleanly");
    let tables = analyzer.into_tables();
    let (ir, diagnostics) = build_program(program, tables);
    assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.messages);
    let mut slot_maps: HashMap<String, SlotMap> = HashMap::new();
    let water = emitter::emit_program(&ir, &mut slot_maps);
    let vm_program = parse_program(&water).unwrap_or_else(|e| panic!("failed to parse emitted water: {e}\n{water}"));
    Vm::new(vm_program, false).run().unwrap_or_else(|e| panic!("vm run failed: {e}\n{water}"))
}

fn as_int(value: Option<Value>) -> i32 {
    match value {
        Some(Value::Int(n)) => n,
        other => panic!("expected Int, got {other:?}"),
    }
}

/// `factorial(6)` computed with the C-style `loop(; i > 0;)` form (spec §8)
/// must actually reach 720 at runtime, not just lower cleanly.
#[test]
fn factorial_of_six_runs_to_seven_hundred_twenty() {
    let body = Block {
        statements: vec![
            stmt(StmtKind::Declaration { name: sp("result"), ty: Some(TypeExpr::Int), is_const: false, initializer: Some(num("1")) }),
            stmt(StmtKind::Declaration { name: sp("i"), ty: Some(TypeExpr::Int), is_const: false, initializer: Some(ident("n")) }),
            stmt(StmtKind::Loop {
                init: None,
                condition: binary(BinaryOp::Gt, ident("i"), num("0")),
                step: None,
                body: Block {
                    statements: vec![
                        stmt(StmtKind::Assignment { target: sp("result"), value: binary(BinaryOp::Mul, ident("result"), ident("i")) }),
                        stmt(StmtKind::Assignment { target: sp("i"), value: binary(BinaryOp::Sub, ident("i"), num("1")) }),
                    ],
                    span: Span::synthetic(),
                },
            }),
            stmt(StmtKind::Return(Some(ident("result")))),
        ],
        span: Span::synthetic(),
    };
    let factorial = Function {
        name: sp("factorial"),
        params: vec![Param { name: sp("n"), ty: TypeExpr::Int, span: Span::synthetic() }],
        return_type: Some(TypeExpr::Int),
        body,
        span: Span::synthetic(),
    };
    let main = Function {
        name: sp("main"),
        params: vec![],
        return_type: Some(TypeExpr::Int),
        body: Block {
            statements: vec![stmt(StmtKind::Return(Some(Expr {
                kind: Box::new(ExprKind::Call { callee: ident("factorial"), args: vec![num("6")] }),
                span: Span::synthetic(),
                id: 0,
            })))],
            span: Span::synthetic(),
        },
        span: Span::synthetic(),
    };
    let program = Program {
        modules: vec![Module {
            name: "Math".to_string(),
            imports: vec![],
            items: vec![
                Item { kind: ItemKind::Function(factorial), span: Span::synthetic(), id: 0 },
                Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 1 },
            ],
            span: Span::synthetic(),
        }],
    };

    assert_eq!(as_int(run(&program)), 720);
}

/// `Base p = new Sub(); p.say()` must actually execute `Sub.say`'s body at
/// runtime, not just resolve the call statically to the right name.
#[test]
fn struct_inheritance_dispatches_to_the_subtypes_method_at_runtime() {
    let base = StructDef {
        name: sp("Base"),
        parent: None,
        fields: vec![FieldDef { name: sp("value"), ty: TypeExpr::Int, span: Span::synthetic() }],
        init: Some(Constructor {
            params: vec![Param { name: sp("value"), ty: TypeExpr::Int, span: Span::synthetic() }],
            body: Block { statements: vec![stmt(StmtKind::Assignment { target: sp("value"), value: ident("value") })], span: Span::synthetic() },
            span: Span::synthetic(),
        }),
        methods: vec![Function {
            name: sp("say"),
            params: vec![],
            return_type: Some(TypeExpr::Int),
            body: Block { statements: vec![stmt(StmtKind::Return(Some(num("0"))))], span: Span::synthetic() },
            span: Span::synthetic(),
        }],
        span: Span::synthetic(),
    };
    let sub = StructDef {
        name: sp("Sub"),
        parent: Some(sp("Base")),
        fields: vec![],
        init: Some(Constructor {
            params: vec![Param { name: sp("value"), ty: TypeExpr::Int, span: Span::synthetic() }],
            body: Block { statements: vec![], span: Span::synthetic() },
            span: Span::synthetic(),
        }),
        methods: vec![Function {
            name: sp("say"),
            params: vec![],
            return_type: Some(TypeExpr::Int),
            body: Block { statements: vec![stmt(StmtKind::Return(Some(num("1"))))], span: Span::synthetic() },
            span: Span::synthetic(),
        }],
        span: Span::synthetic(),
    };
    let main = Function {
        name: sp("main"),
        params: vec![],
        return_type: Some(TypeExpr::Int),
        body: Block {
            statements: vec![
                stmt(StmtKind::Declaration {
                    name: sp("p"),
                    ty: Some(TypeExpr::Named("Base".to_string())),
                    is_const: false,
                    initializer: Some(Expr {
                        kind: Box::new(ExprKind::New { type_name: sp("Sub"), args: vec![num("42")] }),
                        span: Span::synthetic(),
                        id: 0,
                    }),
                }),
                stmt(StmtKind::Return(Some(Expr {
                    kind: Box::new(ExprKind::Call {
                        callee: Expr { kind: Box::new(ExprKind::Member { object: ident("p"), member: sp("say") }), span: Span::synthetic(), id: 0 },
                        args: vec![],
                    }),
                    span: Span::synthetic(),
                    id: 0,
                }))),
            ],
            span: Span::synthetic(),
        },
        span: Span::synthetic(),
    };
    let program = Program {
        modules: vec![Module {
            name: "Shapes".to_string(),
            imports: vec![],
            items: vec![
                Item { kind: ItemKind::Struct(base), span: Span::synthetic(), id: 0 },
                Item { kind: ItemKind::Struct(sub), span: Span::synthetic(), id: 1 },
                Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 2 },
            ],
            span: Span::synthetic(),
        }],
    };

    assert_eq!(as_int(run(&program)), 1, "expected Sub.say's body (returns 1) to run, not Base.say's");
}

/// `false && (1 / i)` must not evaluate its right operand: with `i = 0` a
/// division would raise a runtime error if the short-circuit didn't hold.
#[test]
fn short_circuit_and_skips_the_divide_by_zero_on_its_right_operand() {
    let main = Function {
        name: sp("main"),
        params: vec![],
        return_type: Some(TypeExpr::Bool),
        body: Block {
            statements: vec![
                stmt(StmtKind::Declaration { name: sp("i"), ty: Some(TypeExpr::Int), is_const: false, initializer: Some(num("0")) }),
                stmt(StmtKind::Return(Some(binary(
                    BinaryOp::And,
                    Expr { kind: Box::new(ExprKind::BooleanLiteral(false)), span: Span::synthetic(), id: 0 },
                    binary(BinaryOp::Eq, binary(BinaryOp::Div, num("1"), ident("i")), num("1")),
                )))),
            ],
            span: Span::synthetic(),
        },
        span: Span::synthetic(),
    };
    let program = Program {
        modules: vec![Module {
            name: "M".to_string(),
            imports: vec![],
            items: vec![Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 0 }],
            span: Span::synthetic(),
        }],
    };

    match run(&program) {
        Some(Value::Bool(false)) => {}
        other => panic!("expected false without a division-by-zero error, got {other:?}"),
    }
}

/// The `||` counterpart: `true || (1 / i == 1)` must not evaluate its right
/// operand either.
#[test]
fn short_circuit_or_skips_the_divide_by_zero_on_its_right_operand() {
    let main = Function {
        name: sp("main"),
        params: vec![],
        return_type: Some(TypeExpr::Bool),
        body: Block {
            statements: vec![
                stmt(StmtKind::Declaration { name: sp("i"), ty: Some(TypeExpr::Int), is_const: false, initializer: Some(num("0")) }),
                stmt(StmtKind::Return(Some(binary(
                    BinaryOp::Or,
                    Expr { kind: Box::new(ExprKind::BooleanLiteral(true)), span: Span::synthetic(), id: 0 },
                    binary(BinaryOp::Eq, binary(BinaryOp::Div, num("1"), ident("i")), num("1")),
                )))),
            ],
            span: Span::synthetic(),
        },
        span: Span::synthetic(),
    };
    let program = Program {
        modules: vec![Module {
            name: "M".to_string(),
            imports: vec![],
            items: vec![Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 0 }],
            span: Span::synthetic(),
        }],
    };

    match run(&program) {
        Some(Value::Bool(true)) => {}
        other => panic!("expected true without a division-by-zero error, got {other:?}"),
    }
}
