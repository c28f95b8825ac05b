//! Per-function symbol table (spec §3 "Scope"): `name → {register, type,
//! optional constant}`, with constant-folding propagation that is
//! invalidated the moment a name is reassigned.
//!
//! Grounded on `seen_typechecker::types::TypeEnvironment`'s HashMap-keyed
//! lookup shape, generalized to also carry a register and an optional
//! folded constant per binding.

use crate::value::Register;
use hashbrown::HashMap;
use snow_semantic::{ConstValue, Type};

#[derive(Debug, Clone)]
pub struct Binding {
    pub register: Register,
    pub ty: Type,
    pub const_value: Option<ConstValue>,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    /// Set when lowering a struct constructor/method body; `this` resolves
    /// through here rather than through `bindings` so field access can tell
    /// "local variable" and "implicit field" apart (spec §4.2 "identifier
    /// resolution with implicit this.name rewrite").
    this_register: Option<Register>,
    this_struct: Option<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<String>, register: Register, ty: Type) {
        self.bindings.insert(name.into(), Binding { register, ty, const_value: None });
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn lookup_register(&self, name: &str) -> Option<Register> {
        self.bindings.get(name).map(|b| b.register)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name).map(|b| &b.ty)
    }

    pub fn set_const_value(&mut self, name: &str, value: ConstValue) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.const_value = Some(value);
        }
    }

    pub fn get_const_value(&self, name: &str) -> Option<&ConstValue> {
        self.bindings.get(name).and_then(|b| b.const_value.as_ref())
    }

    /// Reassignment drops any previously folded constant for `name` (spec
    /// §4.2): the next read must come from the register, not the stale
    /// fold.
    pub fn clear_const_value(&mut self, name: &str) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.const_value = None;
        }
    }

    pub fn set_this(&mut self, register: Register, struct_name: impl Into<String>) {
        self.this_register = Some(register);
        self.this_struct = Some(struct_name.into());
    }

    pub fn this(&self) -> Option<(Register, &str)> {
        self.this_register.zip(self.this_struct.as_deref())
    }

    pub fn this_struct_name(&self) -> Option<&str> {
        self.this_struct.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassignment_clears_folded_constant() {
        let mut scope = Scope::new();
        scope.declare("x", Register(0), Type::int());
        scope.set_const_value("x", ConstValue::Int(5));
        assert_eq!(scope.get_const_value("x"), Some(&ConstValue::Int(5)));
        scope.clear_const_value("x");
        assert_eq!(scope.get_const_value("x"), None);
    }

    #[test]
    fn this_binding_is_distinct_from_locals() {
        let mut scope = Scope::new();
        scope.set_this(Register(0), "Point");
        assert_eq!(scope.this_struct_name(), Some("Point"));
        assert!(scope.lookup("this").is_none());
    }
}
