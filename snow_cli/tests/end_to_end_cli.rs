//! Drives the whole `module:`/`import:` + JSON-body `.snow` file format
//! through `project::build_program` → `driver::analyze` →
//! `driver::build_water` → `driver::run_water`, the same chain `main.rs`
//! runs for a real invocation of the `snow` binary.

use std::fs;

use snow_ast::{
    BinaryOp, Block, Constructor, Expr, ExprKind, FieldDef, Function, Item, ItemKind, Param, Stmt, StmtKind, StructDef,
    TypeExpr,
};
use snow_cli::{driver, project};
use snow_common::{Span, Spanned};
use tempfile::TempDir;

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

/// Writes one `.snow` file (`module:` header, no imports, a JSON-encoded
/// item list body) into `dir` and returns its path.
fn write_source(dir: &TempDir, module_name: &str, items: &[Item]) -> std::path::PathBuf {
    let body = serde_json::to_string(items).expect("items should serialize");
    let text = format!("module: {module_name}\n{body}\n");
    let path = dir.path().join(format!("{module_name}.snow"));
    fs::write(&path, text).unwrap();
    path
}

fn run_one_file(dir: &TempDir, module_name: &str, items: Vec<Item>) -> Option<snow_vm::Value> {
    let path = write_source(dir, module_name, &items);
    let program = project::build_program(&[path]).expect("source discovery should succeed");
    let tables = driver::analyze(&program).unwrap_or_else(|d| panic!("unexpected diagnostics: {:?}", d.messages));
    let (water, _ir) = driver::build_water(&program, tables).expect("lowering should succeed");
    driver::run_water(&water, false).expect("vm run should succeed")
}

fn as_int(value: Option<snow_vm::Value>) -> i32 {
    match value {
        Some(snow_vm::Value::Int(n)) => n,
        other => panic!("expected Int, got {other:?}"),
    }
}

#[test]
fn factorial_source_file_runs_to_seven_hundred_twenty() {
    let dir = TempDir::new().unwrap();
    let factorial_body = Block {
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
        body: factorial_body,
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
    let items = vec![
        Item { kind: ItemKind::Function(factorial), span: Span::synthetic(), id: 0 },
        Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 1 },
    ];

    let result = run_one_file(&dir, "Math", items);
    assert_eq!(as_int(result), 720);
}

#[test]
fn struct_inheritance_source_file_dispatches_to_the_subtypes_method() {
    let dir = TempDir::new().unwrap();
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
    let items = vec![
        Item { kind: ItemKind::Struct(base), span: Span::synthetic(), id: 0 },
        Item { kind: ItemKind::Struct(sub), span: Span::synthetic(), id: 1 },
        Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 2 },
    ];

    let result = run_one_file(&dir, "Shapes", items);
    assert_eq!(as_int(result), 1, "expected Sub.say's body to run, not Base.say's");
}

/// `false && (1/i == 1)` with `i = 0` must come back `false` rather than
/// raising the division's runtime error.
#[test]
fn short_circuit_source_file_skips_the_divide_by_zero() {
    let dir = TempDir::new().unwrap();
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
    let items = vec![Item { kind: ItemKind::Function(main), span: Span::synthetic(), id: 0 }];

    let result = run_one_file(&dir, "M", items);
    match result {
        Some(snow_vm::Value::Bool(false)) => {}
        other => panic!("expected false without a division-by-zero error, got {other:?}"),
    }
}
