//! The Snow virtual machine (spec §4.8, §4.9, §5): a textual-opcode stack
//! machine with a process-wide syscall table and resource registries.
//!
//! Loads a `.water` program ([`parser::parse_program`]) and runs it
//! ([`core::Vm`]). [`core::Interp`] is the per-thread execution context that
//! `THREAD_CREATE` clones a fresh copy of; [`registry::Registries`] is the
//! process-wide state every thread shares.

pub mod builtins;
pub mod core;
pub mod instr;
pub mod parser;
pub mod registry;
pub mod syscalls;
pub mod value;

pub use core::{Interp, Vm, VmShared};
pub use parser::{parse_program, FunctionCode, Program};
pub use registry::Registries;
pub use value::Value;
