//! The lexer/parser this crate's AST is the contract for hands programs
//! across as JSON (spec §6); these tests confirm a representative program
//! survives a `serde_json` round trip byte-for-byte.

use snow_ast::{
    BinaryOp, Block, Constructor, Expr, ExprKind, FieldDef, Function, Item, ItemKind, Module, Param, Program, Stmt,
    StmtKind, StructDef, TypeExpr,
};
use snow_common::{Span, Spanned};

fn ident(name: &str) -> Expr {
    Expr { kind: Box::new(ExprKind::Identifier(name.to_string())), span: Span::synthetic(), id: 0 }
}

fn num(text: &str) -> Expr {
    Expr { kind: Box::new(ExprKind::NumberLiteral(text.to_string())), span: Span::synthetic(), id: 0 }
}

fn spanned(name: &str) -> Spanned<String> {
    Spanned::new(name.to_string(), Span::synthetic())
}

fn struct_inheritance_program() -> Program {
    let base = StructDef {
        name: spanned("Base"),
        parent: None,
        fields: vec![FieldDef { name: spanned("value"), ty: TypeExpr::Int, span: Span::synthetic() }],
        init: Some(Constructor {
            params: vec![Param { name: spanned("value"), ty: TypeExpr::Int, span: Span::synthetic() }],
            body: Block {
                statements: vec![Stmt {
                    kind: StmtKind::Assignment { target: spanned("value"), value: ident("value") },
                    span: Span::synthetic(),
                    id: 0,
                }],
                span: Span::synthetic(),
            },
            span: Span::synthetic(),
        }),
        methods: vec![Function {
            name: spanned("say"),
            params: vec![],
            return_type: None,
            body: Block { statements: vec![], span: Span::synthetic() },
            span: Span::synthetic(),
        }],
        span: Span::synthetic(),
    };

    let sub = StructDef {
        name: spanned("Sub"),
        parent: Some(spanned("Base")),
        fields: vec![],
        init: None,
        methods: vec![Function {
            name: spanned("say"),
            params: vec![],
            return_type: None,
            body: Block {
                statements: vec![Stmt {
                    kind: StmtKind::ExprStmt(Expr {
                        kind: Box::new(ExprKind::Binary { op: BinaryOp::Add, left: num("1"), right: num("2") }),
                        span: Span::synthetic(),
                        id: 1,
                    }),
                    span: Span::synthetic(),
                    id: 0,
                }],
                span: Span::synthetic(),
            },
            span: Span::synthetic(),
        }],
        span: Span::synthetic(),
    };

    Program {
        modules: vec![Module {
            name: "Shapes".to_string(),
            imports: vec![],
            items: vec![
                Item { kind: ItemKind::Struct(base), span: Span::synthetic(), id: 0 },
                Item { kind: ItemKind::Struct(sub), span: Span::synthetic(), id: 1 },
            ],
            span: Span::synthetic(),
        }],
    }
}

#[test]
fn struct_inheritance_program_round_trips_through_json() {
    let program = struct_inheritance_program();
    let encoded = serde_json::to_string(&program).expect("serialize");
    let decoded: Program = serde_json::from_str(&encoded).expect("deserialize");
    let re_encoded = serde_json::to_string(&decoded).expect("re-serialize");
    assert_eq!(encoded, re_encoded);
}

#[test]
fn array_and_index_expressions_round_trip() {
    let expr = Expr {
        kind: Box::new(ExprKind::Index {
            array: Expr {
                kind: Box::new(ExprKind::ArrayLiteral(vec![num("1"), num("2"), num("3")])),
                span: Span::synthetic(),
                id: 0,
            },
            index: num("1"),
        }),
        span: Span::synthetic(),
        id: 0,
    };
    let encoded = serde_json::to_string(&expr).expect("serialize");
    let decoded: Expr = serde_json::from_str(&encoded).expect("deserialize");
    match *decoded.kind {
        ExprKind::Index { array, index } => {
            match *array.kind {
                ExprKind::ArrayLiteral(items) => assert_eq!(items.len(), 3),
                other => panic!("unexpected array kind: {:?}", other),
            }
            match *index.kind {
                ExprKind::NumberLiteral(text) => assert_eq!(text, "1"),
                other => panic!("unexpected index kind: {:?}", other),
            }
        }
        other => panic!("unexpected expr kind: {:?}", other),
    }
}

#[test]
fn an_empty_program_round_trips() {
    let program = Program::default();
    let encoded = serde_json::to_string(&program).unwrap();
    let decoded: Program = serde_json::from_str(&encoded).unwrap();
    assert!(decoded.modules.is_empty());
}
