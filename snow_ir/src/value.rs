//! IR values: virtual registers and operands (spec §3 "Virtual register",
//! generalized from `seen_ir::Value`'s `Register(u32)`/literal variants to
//! the typed constant set [`snow_semantic::ConstValue`] already shared with
//! the semantic analyzer).

use serde::{Deserialize, Serialize};
use snow_semantic::ConstValue;
use std::fmt;

/// A virtual register. Single-assignment by convention (spec §3): the
/// builder never reuses a register id for a second value within one
/// function, though the register allocator may later map several registers
/// to the same physical slot once their live ranges no longer overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Register(pub u32);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A function-local jump target, named `L0`, `L1`, … in emission order
/// (spec §3 "Label").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Anything an instruction can read: a register holding a previously
/// computed value, or a tagged compile-time constant inlined directly into
/// the instruction (spec §3 "Constant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Register(Register),
    Const(ConstValue),
}

impl From<Register> for Operand {
    fn from(r: Register) -> Self {
        Operand::Register(r)
    }
}

impl From<ConstValue> for Operand {
    fn from(c: ConstValue) -> Self {
        Operand::Const(c)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Const(c) => write!(f, "{}", c.display()),
        }
    }
}

/// Monotonic register/label allocator for one function (spec §3, §4.4
/// "per-function label counter").
#[derive(Debug, Default)]
pub struct IdGen {
    next_register: u32,
    next_label: u32,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_register(&mut self) -> Register {
        let r = Register(self.next_register);
        self.next_register += 1;
        r
    }

    pub fn fresh_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }
}
