//! The finished IR artifacts handed to the register allocator / VM code
//! emitter: one [`IrFunction`] per Snow function (including lowered struct
//! constructors/methods and the synthesized entry), bundled into an
//! [`IrProgram`] alongside the [`ProgramTables`] built during analysis.

use crate::instr::Instruction;
use crate::value::Register;
use serde::{Deserialize, Serialize};
use snow_semantic::{ProgramTables, Type};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrFunction {
    /// Fully qualified name: `Module.function`, `Struct.__init__N`, or
    /// `Struct.method_N` (spec §3).
    pub name: String,
    /// Parameter registers in call order (`this` first for methods/ctors).
    pub params: Vec<Register>,
    pub return_type: Type,
    pub body: Vec<Instruction>,
    /// Every register's inferred type, keyed for deterministic `--debug`
    /// dumps (spec's "global-table dump" supplement).
    pub register_types: BTreeMap<u32, Type>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
    #[serde(skip)]
    pub tables: ProgramTables,
}

impl IrProgram {
    /// The function the VM begins executing (spec §4.4 "entry
    /// normalization"): `main`/`*.main` if present, else the synthesized
    /// `_start` wrapping top-level statements, always moved to index 0.
    pub fn entry(&self) -> Option<&IrFunction> {
        self.functions.first()
    }
}
