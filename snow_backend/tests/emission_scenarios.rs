//! Full pipeline emission scenarios: analyze, lower to IR, then emit
//! `.water` text, the same chain `snow_cli::driver::build_water` runs.

use hashbrown::HashMap;
use snow_ast::{
    BinaryOp, Block, Constructor, Expr, ExprKind, FieldDef, Function, Item, ItemKind, Module, Param, Program, Stmt,
    StmtKind, StructDef, TypeExpr,
};
use snow_backend::{emitter, SlotMap};
use snow_common::{Span, Spanned};
use snow_ir::build_program;
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

fn water_for(program: &Program) -> String {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(program).expect("program should analyze cleanly");
    let tables = analyzer.into_tables();
    let (ir, diagnostics) = build_program(program, tables);
    assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.messages);
    let mut slot_maps: HashMap<String, SlotMap> = HashMap::new();
    emitter::emit_program(&ir, &mut slot_maps)
}

#[test]
fn factorial_emits_a_func_block_with_a_multiply_opcode() {
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
    let program = Program {
        modules: vec![Module {
            name: "Math".to_string(),
            imports: vec![],
            items: vec![Item { kind: ItemKind::Function(factorial), span: Span::synthetic(), id: 0 }],
            span: Span::synthetic(),
        }],
    };

    let water = water_for(&program);
    assert!(water.contains("FUNC \"Math.factorial\""), "water:\n{water}");
    assert!(water.contains("MUL_I32"), "expected a width-specific multiply opcode, water:\n{water}");
    assert!(water.contains("JUMP"), "expected the loop's backward jump, water:\n{water}");
}

/// A `byte`-typed struct field store lowers to the `__setindex_b` channel
/// end to end, not the generic `__setindex_r` one.
#[test]
fn byte_field_store_emits_the_typed_setindex_channel() {
    let point = StructDef {
        name: sp("Point"),
        parent: None,
        fields: vec![FieldDef { name: sp("x"), ty: TypeExpr::Byte, span: Span::synthetic() }],
        init: Some(Constructor {
            params: vec![Param { name: sp("x"), ty: TypeExpr::Byte, span: Span::synthetic() }],
            body: Block { statements: vec![stmt(StmtKind::Assignment { target: sp("x"), value: ident("x") })], span: Span::synthetic() },
            span: Span::synthetic(),
        }),
        methods: vec![],
        span: Span::synthetic(),
    };
    let program = Program {
        modules: vec![Module {
            name: "Geometry".to_string(),
            imports: vec![],
            items: vec![Item { kind: ItemKind::Struct(point), span: Span::synthetic(), id: 0 }],
            span: Span::synthetic(),
        }],
    };

    let water = water_for(&program);
    assert!(water.contains("__setindex_b"), "water:\n{water}");
    assert!(!water.contains("__setindex_r"), "field store should not fall back to the generic channel, water:\n{water}");
}
