//! The `compile`/`run` pipeline (spec §2's five stages wired end to end):
//! [`snow_semantic::Analyzer`] → [`snow_ir::build_program`] →
//! [`snow_backend`]'s allocator/emitter → a `.water` file, optionally handed
//! straight to [`snow_vm::Vm`].
//!
//! Mirrors `seen_cli::main`'s stage-by-stage `Result` chain, generalized
//! from "typecheck, then interpret the AST directly" to the extra
//! IR-building and VM-emission stages this pipeline has in between.

use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use snow_ast::Program as AstProgram;
use snow_backend::{emitter, RegisterAllocator, SlotMap};
use snow_common::{Diagnostics, SnowError, SnowResult};
use snow_ir::IrProgram;
use snow_semantic::Analyzer;

/// Runs semantic analysis; returns the completed `ProgramTables` and the
/// collected diagnostics (warnings may be present even on success).
pub fn analyze(program: &AstProgram) -> Result<snow_semantic::ProgramTables, Diagnostics> {
    let mut analyzer = Analyzer::new();
    match analyzer.check_program(program) {
        Ok(()) => Ok(analyzer.into_tables()),
        Err(()) => Err(analyzer.diagnostics().clone()),
    }
}

/// Lowers an analyzed program to `.water` text. `diagnostics` collects
/// warnings raised while lowering; a non-empty error set aborts the build.
pub fn build_water(program: &AstProgram, tables: snow_semantic::ProgramTables) -> SnowResult<(String, IrProgram)> {
    let (ir, diagnostics) = snow_ir::build_program(program, tables);
    if diagnostics.has_errors() {
        let messages: Vec<String> = diagnostics.errors().map(|d| d.to_string()).collect();
        return Err(SnowError::build_error(messages.join("\n")));
    }
    let mut slot_maps: HashMap<String, SlotMap> = HashMap::new();
    let water = emitter::emit_program(&ir, &mut slot_maps);
    Ok((water, ir))
}

/// Writes `water` to `path`, adding a `.water` extension if `path` doesn't
/// already have one (spec §6: "`-o <name>`, `.water` suffix added if
/// missing").
pub fn write_water(path: &Path, water: &str) -> SnowResult<std::path::PathBuf> {
    let path = if path.extension().is_some_and(|e| e == "water") { path.to_path_buf() } else { path.with_extension("water") };
    fs::write(&path, water).map_err(|e| SnowError::io_error(format!("{}: {}", path.display(), e)))?;
    Ok(path)
}

/// Loads and runs a `.water` program (spec §4.8/§4.9), returning whatever
/// value its entry function leaves behind.
pub fn run_water(water: &str, trace: bool) -> SnowResult<Option<snow_vm::Value>> {
    let program = snow_vm::parse_program(water)?;
    let vm = snow_vm::Vm::new(program, trace);
    vm.run()
}

/// Dumps every register's inferred type and each function's allocated slot
/// count — the `--debug` supplement spec's `SPEC_FULL.md` documents for the
/// register allocator.
pub fn debug_dump(ir: &IrProgram) -> String {
    let mut out = String::new();
    for function in &ir.functions {
        let slots = RegisterAllocator::allocate(function);
        let stats = slots.stats();
        out.push_str(&format!(
            "{}: {} params, {} slots, {} registers typed\n",
            function.name,
            function.params.len(),
            stats.slot_count,
            function.register_types.len()
        ));
    }
    out
}
