//! Top-level lowering: module functions, struct constructors/methods, and
//! entry normalization (spec §4.4) — top-level statements are wrapped into
//! a synthesized `_start`, and whichever function ends up the program's
//! entry point (`main`, or `_start` when no `main` exists) is moved to
//! index 0 of the finished [`IrProgram`].
//!
//! Mirrors `seen_typechecker::checker::check_program`'s module-iteration
//! shape, one function/constructor/method body lowered at a time through
//! its own [`Builder`]; the [`ProgramTables`] passed in is already complete
//! (built by the semantic analyzer's pass 1) so this pass never touches the
//! global tables, only reads them.

use super::Builder;
use crate::function::{IrFunction, IrProgram};
use snow_ast::{Constructor, Function, ItemKind, Program, Stmt, StructDef};
use snow_common::Diagnostics;
use snow_semantic::{ctor_name, method_name, PrimitiveType, ProgramTables, Type};

/// Lowers every function/constructor/method in `program`, plus a synthesized
/// `_start` wrapping its top-level statements when no `main` is present,
/// into a finished [`IrProgram`] with the entry function at index 0.
pub fn build_program(program: &Program, tables: ProgramTables) -> (IrProgram, Diagnostics) {
    let mut functions = Vec::new();
    let mut diagnostics = Diagnostics::new();
    let mut entry_stmts: Vec<(String, &Stmt)> = Vec::new();

    for module in &program.modules {
        for item in &module.items {
            match &item.kind {
                ItemKind::Function(f) => {
                    let (func, diags) = build_function(&tables, &module.name, f, None);
                    functions.push(func);
                    diagnostics.extend(diags);
                }
                ItemKind::Struct(s) => {
                    let (mut struct_fns, diags) = build_struct(&tables, &module.name, s);
                    functions.append(&mut struct_fns);
                    diagnostics.extend(diags);
                }
                ItemKind::TopLevelStmt(stmt) => entry_stmts.push((module.name.clone(), stmt)),
                ItemKind::Const(_) => {}
            }
        }
    }

    match functions.iter().position(|f| is_entry_name(&f.name)) {
        Some(0) => {}
        Some(idx) => functions.swap(0, idx),
        None => {
            let (start, diags) = build_start(&tables, &entry_stmts);
            diagnostics.extend(diags);
            functions.insert(0, start);
        }
    }

    (IrProgram { functions, tables }, diagnostics)
}

/// A function is the program entry when its qualified name's final segment
/// is `main` — only plain module functions ever qualify (a struct method
/// named `main` lowers to `Struct.main_N`, which never matches).
fn is_entry_name(qualified: &str) -> bool {
    qualified.rsplit('.').next() == Some("main")
}

fn build_function(
    tables: &ProgramTables,
    module_name: &str,
    f: &Function,
    this_struct: Option<&str>,
) -> (IrFunction, Diagnostics) {
    let mut builder = Builder::new(tables, module_name);
    let mut params = Vec::with_capacity(f.params.len() + 1);

    if let Some(struct_name) = this_struct {
        let this_reg = builder.fresh_register(Type::Struct(struct_name.to_string()));
        builder.scope.set_this(this_reg, struct_name.to_string());
        params.push(this_reg);
    }
    for p in &f.params {
        let ty = Type::from_type_expr(&p.ty);
        let reg = builder.fresh_register(ty.clone());
        builder.scope.declare(p.name.value.clone(), reg, ty);
        params.push(reg);
    }

    let return_type = f.return_type.as_ref().map(Type::from_type_expr).unwrap_or_else(Type::void);
    let suffix = default_suffix_for(&return_type);
    builder.with_default_suffix(suffix, |b| b.build_block(&f.body));

    let qualified_name = match this_struct {
        Some(struct_name) => method_name(struct_name, &f.name.value, f.params.len()),
        None => format!("{}.{}", module_name, f.name.value),
    };
    finish(builder, qualified_name, params, return_type)
}

fn build_struct(tables: &ProgramTables, module_name: &str, s: &StructDef) -> (Vec<IrFunction>, Diagnostics) {
    let mut functions = Vec::new();
    let mut diagnostics = Diagnostics::new();

    if let Some(init) = &s.init {
        let (func, diags) = build_constructor(tables, module_name, &s.name.value, init);
        functions.push(func);
        diagnostics.extend(diags);
    }
    for m in &s.methods {
        let (func, diags) = build_function(tables, module_name, m, Some(&s.name.value));
        functions.push(func);
        diagnostics.extend(diags);
    }
    (functions, diagnostics)
}

fn build_constructor(
    tables: &ProgramTables,
    module_name: &str,
    struct_name: &str,
    init: &Constructor,
) -> (IrFunction, Diagnostics) {
    let mut builder = Builder::new(tables, module_name);
    let this_reg = builder.fresh_register(Type::Struct(struct_name.to_string()));
    builder.scope.set_this(this_reg, struct_name.to_string());
    let mut params = vec![this_reg];
    for p in &init.params {
        let ty = Type::from_type_expr(&p.ty);
        let reg = builder.fresh_register(ty.clone());
        builder.scope.declare(p.name.value.clone(), reg, ty);
        params.push(reg);
    }
    builder.build_block(&init.body);

    let qualified_name = ctor_name(struct_name, init.params.len());
    finish(builder, qualified_name, params, Type::void())
}

/// Wraps every top-level statement (across however many modules declared
/// one) into the synthesized entry function. Statements are lowered in
/// declaration order under the first contributing module's qualification
/// context — in practice exactly one module carries top-level statements,
/// so this only matters for the rare multi-module-entry program.
fn build_start(tables: &ProgramTables, stmts: &[(String, &Stmt)]) -> (IrFunction, Diagnostics) {
    let module_name = stmts.first().map(|(m, _)| m.clone()).unwrap_or_else(|| "_start".to_string());
    let mut builder = Builder::new(tables, module_name);
    for (_, stmt) in stmts {
        builder.build_stmt(stmt);
    }
    finish(builder, "_start".to_string(), vec![], Type::void())
}

fn finish(
    mut builder: Builder<'_>,
    name: String,
    params: Vec<crate::value::Register>,
    return_type: Type,
) -> (IrFunction, Diagnostics) {
    let diagnostics = builder.diagnostics().clone();
    let body = builder.take_instructions();
    let register_types = builder.take_register_types();
    (IrFunction { name, params, return_type, body, register_types }, diagnostics)
}

/// The default-numeric-suffix hint (spec §4.4): a function returning
/// `long`/`float`/`double` widens its own unsuffixed int literals to match,
/// so `return 0;` in a `long`-returning function doesn't truncate.
fn default_suffix_for(return_type: &Type) -> Option<PrimitiveType> {
    match return_type {
        Type::Primitive(p @ (PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Double)) => Some(*p),
        _ => None,
    }
}
