//! Register allocation and `.water` VM-code emission (spec §4.6, §4.7):
//! the last two stages of the pipeline before a program is runnable.

pub mod alloc;
pub mod emitter;

pub use alloc::{AllocStats, RegisterAllocator, SlotMap};
pub use emitter::{emit_function, emit_program};
