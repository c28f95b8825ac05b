//! Virtual register → VM local-variable slot allocation (spec §4.6).
//!
//! A minimum-width allocator: slots are handed out in order of first
//! appearance within the function, with parameters claiming `0..k-1` because
//! the IR builder always allocates their registers before any local
//! (`snow_ir::builder::program::build_function`). Since each function gets
//! its own monotonic [`snow_ir::IdGen`] starting at register 0, first
//! appearance already coincides with increasing register id, so in practice
//! `slot == register.0` — the spec explicitly permits this identity mapping,
//! but [`RegisterAllocator::allocate`] still walks the instruction stream
//! rather than assuming it, so the result stays correct if that invariant
//! ever changes upstream.

use hashbrown::HashMap;
use snow_ir::{Instruction, IrFunction, Operand, Register};

/// `virtual register → slot index`, plus the bookkeeping `--debug` wants
/// (spec's `SPEC_FULL.md` "register allocator `stats()` accessor").
#[derive(Debug, Clone, Default)]
pub struct SlotMap {
    slots: HashMap<u32, u32>,
    next_slot: u32,
    param_count: u32,
}

impl SlotMap {
    pub fn slot_of(&self, reg: Register) -> u32 {
        self.slots.get(&reg.0).copied().unwrap_or_else(|| panic!("register {} was never allocated a slot", reg))
    }

    /// Reserves a fresh slot beyond every register the allocator assigned,
    /// for the emitter's own scratch values (materializing inline constants
    /// into addressable slots). Never collides with a real register's slot.
    pub fn reserve_temp(&mut self) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    pub fn stats(&self) -> AllocStats {
        AllocStats { slot_count: self.next_slot, param_count: self.param_count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    pub slot_count: u32,
    pub param_count: u32,
}

pub struct RegisterAllocator;

impl RegisterAllocator {
    /// Walks `function`'s parameter list and body in order, assigning each
    /// newly seen register the next free slot.
    pub fn allocate(function: &IrFunction) -> SlotMap {
        let mut map = SlotMap::default();
        for &param in &function.params {
            Self::assign(&mut map, param);
        }
        map.param_count = function.params.len() as u32;
        for instr in &function.body {
            Self::visit_instruction(&mut map, instr);
        }
        map
    }

    fn assign(map: &mut SlotMap, reg: Register) -> u32 {
        *map.slots.entry(reg.0).or_insert_with(|| {
            let slot = map.next_slot;
            map.next_slot += 1;
            slot
        })
    }

    fn visit_operand(map: &mut SlotMap, operand: &Operand) {
        if let Operand::Register(r) = operand {
            Self::assign(map, *r);
        }
    }

    fn visit_instruction(map: &mut SlotMap, instr: &Instruction) {
        match instr {
            Instruction::LoadConst { dest, .. } => {
                Self::assign(map, *dest);
            }
            Instruction::Move { dest, src, .. } => {
                Self::assign(map, *dest);
                Self::assign(map, *src);
            }
            Instruction::Arith { dest, left, right, .. } | Instruction::Bitwise { dest, left, right, .. } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, left);
                Self::visit_operand(map, right);
            }
            Instruction::Compare { dest, left, right, .. } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, left);
                Self::visit_operand(map, right);
            }
            Instruction::Unary { dest, operand, .. } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, operand);
            }
            Instruction::RefAdd { dest, left, right } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, left);
                Self::visit_operand(map, right);
            }
            Instruction::Label(_) | Instruction::Jump(_) => {}
            Instruction::JumpIfTrue { condition, .. } => Self::visit_operand(map, condition),
            Instruction::Call { dest, args, .. } => {
                if let Some(dest) = dest {
                    Self::assign(map, *dest);
                }
                for a in args {
                    Self::visit_operand(map, a);
                }
            }
            Instruction::Syscall { dest, subcommand, args } => {
                if let Some(dest) = dest {
                    Self::assign(map, *dest);
                }
                Self::visit_operand(map, subcommand);
                for a in args {
                    Self::visit_operand(map, a);
                }
            }
            Instruction::Return(value) => {
                if let Some(v) = value {
                    Self::visit_operand(map, v);
                }
            }
            Instruction::NewStruct { dest, args, .. } => {
                Self::assign(map, *dest);
                for a in args {
                    Self::visit_operand(map, a);
                }
            }
            Instruction::LoadField { dest, object, .. } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, object);
            }
            Instruction::StoreField { object, value, .. } => {
                Self::visit_operand(map, object);
                Self::visit_operand(map, value);
            }
            Instruction::NewArray { dest, elements } => {
                Self::assign(map, *dest);
                for e in elements {
                    Self::visit_operand(map, e);
                }
            }
            Instruction::LoadIndex { dest, array, index } => {
                Self::assign(map, *dest);
                Self::visit_operand(map, array);
                Self::visit_operand(map, index);
            }
            Instruction::StoreIndex { array, index, value } => {
                Self::visit_operand(map, array);
                Self::visit_operand(map, index);
                Self::visit_operand(map, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_ir::{ArithOp, Width};
    use snow_semantic::Type;
    use std::collections::BTreeMap;

    fn func_with(params: Vec<Register>, body: Vec<Instruction>) -> IrFunction {
        IrFunction { name: "M.f".into(), params, return_type: Type::void(), body, register_types: BTreeMap::new() }
    }

    #[test]
    fn params_get_the_first_slots_in_order() {
        let f = func_with(vec![Register(0), Register(1)], vec![]);
        let map = RegisterAllocator::allocate(&f);
        assert_eq!(map.slot_of(Register(0)), 0);
        assert_eq!(map.slot_of(Register(1)), 1);
        assert_eq!(map.stats().param_count, 2);
    }

    #[test]
    fn locals_continue_after_params() {
        let f = func_with(
            vec![Register(0)],
            vec![Instruction::Arith {
                op: ArithOp::Add,
                width: Width::Int,
                dest: Register(1),
                left: Operand::Register(Register(0)),
                right: Operand::Const(snow_semantic::ConstValue::Int(1)),
            }],
        );
        let map = RegisterAllocator::allocate(&f);
        assert_eq!(map.slot_of(Register(0)), 0);
        assert_eq!(map.slot_of(Register(1)), 1);
        assert_eq!(map.stats().slot_count, 2);
    }

    #[test]
    fn reserve_temp_never_collides_with_a_real_slot() {
        let f = func_with(vec![Register(0)], vec![]);
        let mut map = RegisterAllocator::allocate(&f);
        let temp = map.reserve_temp();
        assert_eq!(temp, 1);
    }
}
