//! IR builder: lowers a (already semantically checked) [`snow_ast::Program`]
//! into an [`crate::function::IrProgram`].
//!
//! Split into `expr` (expression lowering + folding), `stmt` (statement
//! lowering, loop/if labeling), and `program` (module/struct/function
//! lowering, entry normalization) the same way the teacher's type checker
//! splits `check_program`/`check_block`/`check_statement`/
//! `infer_expression_type` across one `impl` (`seen_typechecker::checker`),
//! just promoted to separate files here because each one is larger.

mod expr;
mod program;
mod stmt;

pub use program::build_program;

use crate::instr::Instruction;
use crate::scope::Scope;
use crate::value::{IdGen, Label, Register};
use snow_common::Diagnostics;
use snow_semantic::{PrimitiveType, ProgramTables};
use std::collections::BTreeMap;

/// Per-function lowering state. A fresh `Builder` is used for each function
/// body (including constructors/methods and the synthesized `_start`); the
/// global [`ProgramTables`] is shared read-only across all of them.
pub struct Builder<'a> {
    pub(crate) tables: &'a ProgramTables,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) module_name: String,
    pub(crate) scope: Scope,
    ids: IdGen,
    instructions: Vec<Instruction>,
    register_types: BTreeMap<u32, snow_semantic::Type>,
    /// Function-scoped default numeric suffix (spec §4.4): an unsuffixed
    /// int literal used in a context that forces a wider return type picks
    /// up this suffix. Set by `program::build_program` for the duration of
    /// one function body via [`Builder::with_default_suffix`], which resets
    /// it even if lowering that body returns early on an error.
    default_suffix: Option<PrimitiveType>,
    /// Stack of (continue-label, break-label) pairs for nested loops (spec
    /// §4.3 "Break/Continue").
    loop_labels: Vec<(Label, Label)>,
}

impl<'a> Builder<'a> {
    pub fn new(tables: &'a ProgramTables, module_name: impl Into<String>) -> Self {
        Self {
            tables,
            diagnostics: Diagnostics::new(),
            module_name: module_name.into(),
            scope: Scope::new(),
            ids: IdGen::new(),
            instructions: Vec::new(),
            register_types: BTreeMap::new(),
            default_suffix: None,
            loop_labels: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn fresh_register(&mut self, ty: snow_semantic::Type) -> Register {
        let r = self.ids.fresh_register();
        self.register_types.insert(r.0, ty);
        r
    }

    pub(crate) fn fresh_label(&mut self) -> Label {
        self.ids.fresh_label()
    }

    pub(crate) fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub(crate) fn take_instructions(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.instructions)
    }

    pub(crate) fn take_register_types(&mut self) -> BTreeMap<u32, snow_semantic::Type> {
        std::mem::take(&mut self.register_types)
    }

    pub(crate) fn push_loop_labels(&mut self, continue_label: Label, break_label: Label) {
        self.loop_labels.push((continue_label, break_label));
    }

    pub(crate) fn pop_loop_labels(&mut self) {
        self.loop_labels.pop();
    }

    pub(crate) fn current_loop_labels(&self) -> Option<(Label, Label)> {
        self.loop_labels.last().copied()
    }

    /// Runs `f` with `suffix` installed as the default numeric suffix,
    /// always restoring the previous value afterward — including when `f`
    /// itself bails out having already recorded diagnostics, so one
    /// function's return-type coercion can never leak into the next (spec
    /// §4.4).
    pub(crate) fn with_default_suffix<R>(&mut self, suffix: Option<PrimitiveType>, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.default_suffix;
        self.default_suffix = suffix;
        let result = f(self);
        self.default_suffix = previous;
        result
    }
}
