//! IR construction for the Snow language (spec §3, §4): lowers a
//! semantically checked [`snow_ast::Program`] into a flat, typed
//! virtual-register instruction stream per function, ready for the
//! register allocator and VM code emitter in `snow_backend`.

mod builder;
mod function;
mod instr;
mod scope;
mod value;

pub use builder::{build_program, Builder};
pub use function::{IrFunction, IrProgram};
pub use instr::{width_of, widen_numeric, ArithOp, BitOp, CompareOp, Instruction, UnaryIrOp, Width};
pub use scope::{Binding, Scope};
pub use value::{IdGen, Label, Operand, Register};
