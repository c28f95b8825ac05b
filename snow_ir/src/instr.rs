//! The typed IR instruction set (spec §3 "Opcode table", generalized from
//! `seen_ir::Instruction`/`BinaryOp`/`CompareOp` to the width-specific
//! arithmetic/comparison families and struct/array operations the Snow
//! spec requires).

use crate::value::{Label, Operand, Register};
use serde::{Deserialize, Serialize};
use snow_semantic::{PrimitiveType, Type};

/// The numeric width an arithmetic/comparison opcode operates at. The
/// register allocator and VM code emitter both switch on this to pick the
/// concrete `.water` opcode mnemonic (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Width {
    pub fn from_primitive(p: PrimitiveType) -> Width {
        match p {
            PrimitiveType::Byte => Width::Byte,
            PrimitiveType::Short => Width::Short,
            PrimitiveType::Int => Width::Int,
            PrimitiveType::Long => Width::Long,
            PrimitiveType::Float => Width::Float,
            PrimitiveType::Double => Width::Double,
            // Non-numeric targets never reach a width-carrying opcode; the
            // builder always picks a width from an operand's numeric type.
            PrimitiveType::Bool | PrimitiveType::Str | PrimitiveType::Void => Width::Int,
        }
    }

    pub fn mnemonic_suffix(self) -> &'static str {
        match self {
            Width::Byte => "B",
            Width::Short => "S",
            Width::Int => "I",
            Width::Long => "L",
            Width::Float => "F",
            Width::Double => "D",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Width::Float | Width::Double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The inversion used by the conditional-jump contract (spec §4.3):
    /// `if (cond) { A } else { B }` emits the *inverted* comparison as a
    /// jump-if-true to B's label, so the fallthrough path is A.
    pub fn invert(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryIrOp {
    Neg,
    Not,
}

/// The width an operation on a value of this type runs at; non-numeric
/// types (struct/array/any/error) fall back to `Int` since they never
/// reach a width-carrying opcode in practice (only numeric-typed operands
/// drive `Arith`/`Compare`/`Unary` selection).
pub fn width_of(ty: &Type) -> Width {
    match ty {
        Type::Primitive(p) => Width::from_primitive(*p),
        _ => Width::Int,
    }
}

/// The wider of two numeric types, per the widening chain (spec §3). Used
/// to pick the opcode width for a binary arithmetic/comparison instruction
/// whose operands may already differ in width.
pub fn widen_numeric(a: &Type, b: &Type) -> Type {
    if let (Type::Primitive(pa), Type::Primitive(pb)) = (a, b) {
        if let (Some(ra), Some(rb)) = (pa.numeric_rank(), pb.numeric_rank()) {
            return if ra >= rb { a.clone() } else { b.clone() };
        }
    }
    a.clone()
}

/// One IR instruction. A function body is a flat `Vec<Instruction>` rather
/// than a basic-block graph (spec §3 keeps control flow as labels plus
/// jumps within a single linear instruction stream, matching the VM's
/// textual `.water` dispatch loop rather than an SSA/CFG representation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instruction {
    LoadConst { dest: Register, value: snow_semantic::ConstValue },
    /// Register-to-register copy, lowered by the backend as `ADD_<W> dest,
    /// src, 0` (spec §3 "move-as-add-zero") rather than a dedicated opcode.
    Move { dest: Register, src: Register, width: Width },
    Arith { op: ArithOp, width: Width, dest: Register, left: Operand, right: Operand },
    Compare { op: CompareOp, width: Width, dest: Register, left: Operand, right: Operand },
    Bitwise { op: BitOp, dest: Register, left: Operand, right: Operand },
    Unary { op: UnaryIrOp, width: Width, dest: Register, operand: Operand },
    /// Reference-ADD: string concatenation or list concatenation (spec §3,
    /// §4.2) — width-agnostic, resolved at the VM by operand tag.
    RefAdd { dest: Register, left: Operand, right: Operand },
    Label(Label),
    Jump(Label),
    /// Jumps to `label` when `condition` (always a bool-typed operand)
    /// evaluates to true.
    JumpIfTrue { label: Label, condition: Operand },
    Call { dest: Option<Register>, callee: String, args: Vec<Operand> },
    /// `syscall(subcommand, ...)` (spec §4.8) — kept distinct from `Call`
    /// since its callee is not a qualified function name but a VM-dispatched
    /// subcommand string, almost always a literal but not required to be
    /// one (the VM reads whatever string operand ends up here at runtime).
    Syscall { dest: Option<Register>, subcommand: Operand, args: Vec<Operand> },
    Return(Option<Operand>),
    NewStruct { dest: Register, struct_name: String, ctor: String, args: Vec<Operand> },
    LoadField { dest: Register, object: Operand, struct_name: String, slot: usize },
    StoreField { object: Operand, struct_name: String, slot: usize, value: Operand },
    NewArray { dest: Register, elements: Vec<Operand> },
    LoadIndex { dest: Register, array: Operand, index: Operand },
    StoreIndex { array: Operand, index: Operand, value: Operand },
}
