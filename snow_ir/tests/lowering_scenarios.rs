//! Whole-program IR lowering scenarios: analyze, then build, the same way
//! `snow_cli::driver` chains the two stages.

use snow_ast::{
    BinaryOp, Block, Constructor, Expr, ExprKind, FieldDef, Function, Item, ItemKind, Module, Param, Program, Stmt,
    StmtKind, StructDef, TypeExpr,
};
use snow_common::{Span, Spanned};
use snow_ir::{build_program, Instruction};
use snow_semantic::Analyzer;

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

fn analyze(program: &Program) -> snow_semantic::ProgramTables {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(program).expect("program should analyze cleanly");
    analyzer.into_tables()
}

fn factorial_program() -> Program {
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
    Program {
        modules: vec![Module {
            name: "Math".to_string(),
            imports: vec![],
            items: vec![Item { kind: ItemKind::Function(factorial), span: Span::synthetic(), id: 0 }],
            span: Span::synthetic(),
        }],
    }
}

#[test]
fn factorial_lowers_to_a_loop_with_a_backward_jump_and_no_diagnostics() {
    let program = factorial_program();
    let tables = analyze(&program);
    let (ir, diagnostics) = build_program(&program, tables);
    assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.messages);

    let factorial = ir.functions.iter().find(|f| f.name == "Math.factorial").expect("factorial function");
    let jumps_backward = factorial.body.iter().any(|instr| matches!(instr, Instruction::Jump(_)));
    assert!(jumps_backward, "expected the loop's backward jump to survive lowering");
    let has_mul = factorial.body.iter().any(|instr| matches!(instr, Instruction::Arith { op: snow_ir::ArithOp::Mul, .. }));
    assert!(has_mul, "expected `result * i` to lower to a Mul instruction");
}

#[test]
fn break_outside_a_loop_is_a_build_diagnostic_not_a_panic() {
    let program = Program {
        modules: vec![Module {
            name: "M".to_string(),
            imports: vec![],
            items: vec![Item {
                kind: ItemKind::TopLevelStmt(stmt(StmtKind::Break)),
                span: Span::synthetic(),
                id: 0,
            }],
            span: Span::synthetic(),
        }],
    };
    // The semantic pass already rejects this, so build the IR directly
    // against an (intentionally) unchecked program to exercise the
    // builder's own diagnostic, independent of the checker's.
    let tables = snow_semantic::ProgramTables::new();
    let (_, diagnostics) = build_program(&program, tables);
    assert!(diagnostics.has_errors());
    assert!(diagnostics.errors().any(|d| d.message.contains("'break' used outside a loop")));
}

#[test]
fn out_of_range_constant_index_aborts_the_build() {
    let array = Expr { kind: Box::new(ExprKind::ArrayLiteral(vec![num("1"), num("2"), num("3")])), span: Span::synthetic(), id: 0 };
    let index_expr = Expr { kind: Box::new(ExprKind::Index { array, index: num("5") }), span: Span::synthetic(), id: 0 };
    let program = Program {
        modules: vec![Module {
            name: "M".to_string(),
            imports: vec![],
            items: vec![Item {
                kind: ItemKind::TopLevelStmt(stmt(StmtKind::ExprStmt(index_expr))),
                span: Span::synthetic(),
                id: 0,
            }],
            span: Span::synthetic(),
        }],
    };
    let tables = snow_semantic::ProgramTables::new();
    let (_, diagnostics) = build_program(&program, tables);
    assert!(diagnostics.has_errors());
    assert!(diagnostics.errors().any(|d| d.message.contains("out of bounds")));
}

/// `Base p = new Sub(42); p.say()` lowers to a direct call on
/// `Sub.say_1`, not `Base.say_1` — the declaration-narrowing rule (spec
/// §4.2) takes effect before call-target resolution runs.
#[test]
fn struct_inheritance_narrowing_dispatches_to_the_subtypes_method() {
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
        init: Some(Constructor { params: vec![Param { name: sp("value"), ty: TypeExpr::Int, span: Span::synthetic() }], body: Block { statements: vec![], span: Span::synthetic() }, span: Span::synthetic() }),
        methods: vec![Function {
            name: sp("say"),
            params: vec![],
            return_type: Some(TypeExpr::Int),
            body: Block { statements: vec![stmt(StmtKind::Return(Some(num("1"))))], span: Span::synthetic() },
            span: Span::synthetic(),
        }],
        span: Span::synthetic(),
    };
    let use_it = Function {
        name: sp("use_it"),
        params: vec![],
        return_type: Some(TypeExpr::Int),
        body: Block {
            statements: vec![
                stmt(StmtKind::Declaration {
                    name: sp("p"),
                    ty: Some(TypeExpr::Named("Base".to_string())),
                    is_const: false,
                    initializer: Some(Expr { kind: Box::new(ExprKind::New { type_name: sp("Sub"), args: vec![num("42")] }), span: Span::synthetic(), id: 0 }),
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
                Item { kind: ItemKind::Function(use_it), span: Span::synthetic(), id: 2 },
            ],
            span: Span::synthetic(),
        }],
    };

    let tables = analyze(&program);
    let (ir, diagnostics) = build_program(&program, tables);
    assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.messages);

    let use_it_fn = ir.functions.iter().find(|f| f.name == "Shapes.use_it").expect("use_it function");
    let dispatches_to_sub = use_it_fn.body.iter().any(|instr| matches!(instr, Instruction::Call { callee, .. } if callee == "Sub.say_1"));
    assert!(dispatches_to_sub, "expected a call to Sub.say_1, got: {:?}", use_it_fn.body);
}
