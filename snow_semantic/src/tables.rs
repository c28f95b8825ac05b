//! Cross-module global tables (spec §3 "Global tables", §4.1).
//!
//! Written once during a module pre-pass and read-only afterwards for a
//! given compilation (spec §5): two concurrent compilations must use
//! disjoint `ProgramTables` instances, so this type is owned per-compilation
//! by the driver rather than kept as a process-global singleton (spec §9,
//! "Process-wide global tables").

use crate::types::{StructHierarchy, Type};
use crate::value::ConstValue;
use hashbrown::HashMap;

/// A function's full signature, keyed by its qualified name
/// (`Module.function`, `Struct.__init__N`, `Struct.method_N`).
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub params: Vec<Type>,
    pub return_type: Type,
}

/// `StructName → ordered field-name list with slot indices` (spec §3).
#[derive(Debug, Clone, Default)]
pub struct StructLayout {
    pub fields: Vec<String>,
    pub field_types: Vec<Type>,
}

impl StructLayout {
    pub fn slot_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    pub fn field_type(&self, field: &str) -> Option<&Type> {
        self.slot_of(field).map(|i| &self.field_types[i])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramTables {
    consts: HashMap<String, ConstValue>,
    functions: HashMap<String, FunctionSignature>,
    struct_layouts: HashMap<String, StructLayout>,
    struct_parents: HashMap<String, String>,
}

impl ProgramTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register-once semantics: the first write wins (spec §4.1).
    pub fn register_const(&mut self, qualified_name: impl Into<String>, value: ConstValue) {
        self.consts.entry(qualified_name.into()).or_insert(value);
    }

    pub fn get_const(&self, qualified_name: &str) -> Option<&ConstValue> {
        self.consts.get(qualified_name)
    }

    pub fn register_function(&mut self, qualified_name: impl Into<String>, sig: FunctionSignature) {
        self.functions.entry(qualified_name.into()).or_insert(sig);
    }

    pub fn get_function(&self, qualified_name: &str) -> Option<&FunctionSignature> {
        self.functions.get(qualified_name)
    }

    pub fn all_functions(&self) -> impl Iterator<Item = (&String, &FunctionSignature)> {
        self.functions.iter()
    }

    pub fn register_struct_layout(&mut self, name: impl Into<String>, layout: StructLayout) {
        self.struct_layouts.entry(name.into()).or_insert(layout);
    }

    pub fn struct_layout(&self, name: &str) -> Option<&StructLayout> {
        self.struct_layouts.get(name)
    }

    pub fn has_struct(&self, name: &str) -> bool {
        self.struct_layouts.contains_key(name)
    }

    pub fn register_parent(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.struct_parents.entry(child.into()).or_insert(parent.into());
    }

    pub fn parent_of(&self, name: &str) -> Option<&String> {
        self.struct_parents.get(name)
    }
}

impl StructHierarchy for ProgramTables {
    fn parent_of(&self, struct_name: &str) -> Option<String> {
        ProgramTables::parent_of(self, struct_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_once_first_write_wins() {
        let mut tables = ProgramTables::new();
        tables.register_const("Math.PI", ConstValue::Int(3));
        tables.register_const("Math.PI", ConstValue::Int(4));
        assert_eq!(tables.get_const("Math.PI"), Some(&ConstValue::Int(3)));
    }

    #[test]
    fn struct_layout_slot_lookup() {
        let mut tables = ProgramTables::new();
        tables.register_struct_layout(
            "Point",
            StructLayout { fields: vec!["x".into(), "y".into()], field_types: vec![Type::int(), Type::int()] },
        );
        let layout = tables.struct_layout("Point").unwrap();
        assert_eq!(layout.slot_of("y"), Some(1));
        assert_eq!(layout.slot_of("z"), None);
    }
}
