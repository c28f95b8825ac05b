//! IR → textual `.water` VM code emission (spec §4.7).
//!
//! The opcode vocabulary follows the examples the spec gives directly:
//! width-suffixed arithmetic (`ADD_I32`, `ADD_I64`, `ADD_F32`, `ADD_F64`,
//! `ADD_R`), `LOAD_CONST`, `JUMP`, `LABEL`, `CALL`, `RET`/`RET_V`,
//! `SYSCALL`. Three opcodes not named in the spec's illustrative list round
//! out what a flat `.water` stream needs and are documented in the
//! project's design ledger: `FUNC name paramCount` marks a callable entry
//! point (the VM pre-scans these into a name→PC table before running, the
//! same way it resolves `L<n>` labels), and `NEW_ARRAY`/`NEW_STRUCT`
//! allocate the list-backed containers that `__index_*`/`__setindex_*` and
//! struct field access operate on.
//!
//! Every comparison-width code reuses [`Width::mnemonic_suffix`] (`B/S/I/
//! L/F/D`), since that is exactly the `CMP_IEQ`/`CMP_INE`-style code the
//! spec's §4.2 prose uses. Arithmetic instead uses the two-character forms
//! the spec spells out (`I8/I16/I32/I64/F32/F64`) — kept as a separate
//! mapping here rather than changed upstream, since the two families use
//! different conventions in the spec text itself.

use crate::alloc::SlotMap;
use snow_ir::{ArithOp, BitOp, CompareOp, Instruction, IrFunction, IrProgram, Operand, UnaryIrOp, Width};
use snow_semantic::{ConstValue, PrimitiveType, ProgramTables, Type};
use std::collections::{BTreeMap, HashMap};

/// The `__index_{b,s,i,l,f,d,r}`/`__setindex_{b,s,i,l,f,d,r}` channel
/// letter for a declared type (spec §4.2/§4.3): boolean falls back to the
/// integer channel; string, struct, array, and unknown/`any` types use the
/// generic reference channel.
fn typed_channel_suffix(ty: &Type) -> &'static str {
    match ty {
        Type::Primitive(PrimitiveType::Byte) => "b",
        Type::Primitive(PrimitiveType::Short) => "s",
        Type::Primitive(PrimitiveType::Int) => "i",
        Type::Primitive(PrimitiveType::Long) => "l",
        Type::Primitive(PrimitiveType::Float) => "f",
        Type::Primitive(PrimitiveType::Double) => "d",
        Type::Primitive(PrimitiveType::Bool) => "i",
        _ => "r",
    }
}

fn arith_width_code(width: Width) -> &'static str {
    match width {
        Width::Byte => "I8",
        Width::Short => "I16",
        Width::Int => "I32",
        Width::Long => "I64",
        Width::Float => "F32",
        Width::Double => "F64",
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn const_operand_text(c: &ConstValue) -> String {
    match c {
        ConstValue::Byte(v) => v.to_string(),
        ConstValue::Short(v) => v.to_string(),
        ConstValue::Int(v) => v.to_string(),
        ConstValue::Long(v) => v.to_string(),
        ConstValue::Float(v) => format!("{:?}", v),
        ConstValue::Double(v) => format!("{:?}", v),
        ConstValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        ConstValue::Str(s) => quote(s),
        ConstValue::Null => "0".to_string(),
        ConstValue::List(_) => unreachable!("list constants are expanded before reaching const_operand_text"),
    }
}

/// A function's lowering context. Holds only the accumulated output lines
/// and the per-width zero-constant cache for `Move`; the slot map is
/// threaded through explicitly as `&mut SlotMap` since it is also mutated
/// (scratch-slot reservation) while this context is alive.
struct FuncEmitter<'a> {
    tables: &'a ProgramTables,
    register_types: &'a BTreeMap<u32, Type>,
    lines: Vec<String>,
    zero_slots: HashMap<&'static str, u32>,
}

impl<'a> FuncEmitter<'a> {
    fn new(tables: &'a ProgramTables, register_types: &'a BTreeMap<u32, Type>) -> Self {
        FuncEmitter { tables, register_types, lines: Vec::new(), zero_slots: HashMap::new() }
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// A fresh scratch slot distinct from every other live value — each
    /// call reserves a new one, since a single instruction may need several
    /// materialized constants alive at once (e.g. both sides of `1 + 2`).
    fn scratch_slot(&self, slots: &mut SlotMap) -> u32 {
        slots.reserve_temp()
    }

    /// A scratch register holding a zero-valued constant of `width`, for
    /// the move-as-add-zero lowering (spec §4.7). Materialized once per
    /// function and reused across every `Move`.
    fn zero_slot_for(&mut self, slots: &mut SlotMap, width: Width) -> u32 {
        let code = arith_width_code(width);
        if let Some(&s) = self.zero_slots.get(code) {
            return s;
        }
        let slot = slots.reserve_temp();
        let zero = match width {
            Width::Byte => ConstValue::Byte(0),
            Width::Short => ConstValue::Short(0),
            Width::Int => ConstValue::Int(0),
            Width::Long => ConstValue::Long(0),
            Width::Float => ConstValue::Float(0.0),
            Width::Double => ConstValue::Double(0.0),
        };
        self.emit(format!("LOAD_CONST {} {}", slot, const_operand_text(&zero)));
        self.zero_slots.insert(code, slot);
        slot
    }

    /// Resolves an operand to a slot index, materializing a constant into
    /// a scratch slot via `LOAD_CONST` first. List constants never reach
    /// here — `lower_instruction` expands them before any operand lookup.
    fn operand_slot(&mut self, slots: &mut SlotMap, op: &Operand) -> u32 {
        match op {
            Operand::Register(r) => slots.slot_of(*r),
            Operand::Const(ConstValue::List(items)) => {
                let dest = self.scratch_slot(slots);
                self.emit_new_array_literal(slots, dest, items);
                dest
            }
            Operand::Const(c) => {
                let slot = self.scratch_slot(slots);
                self.emit(format!("LOAD_CONST {} {}", slot, const_operand_text(c)));
                slot
            }
        }
    }

    fn operand_type(&self, op: &Operand) -> Type {
        match op {
            Operand::Register(r) => self.register_types.get(&r.0).cloned().unwrap_or(Type::Any),
            Operand::Const(c) => c.type_of(),
        }
    }

    /// The declared type of array `array`'s elements, for the typed
    /// `__index_*`/`__setindex_*` channel an `a[i]` load/store picks (spec
    /// §4.2's "typed dispatch ... chosen by the declared element type").
    fn element_type(&self, array: &Operand) -> Type {
        match self.operand_type(array) {
            Type::Array(elem) => *elem,
            _ => Type::Any,
        }
    }

    fn field_type(&self, struct_name: &str, slot: usize) -> Type {
        self.tables
            .struct_layout(struct_name)
            .and_then(|layout| layout.field_types.get(slot))
            .cloned()
            .unwrap_or(Type::Any)
    }

    /// Eq/Ne between structs, arrays, or strings gets the reference-equality
    /// variant (spec §3 "with a reference-equality variant") rather than the
    /// numeric-width comparison both operands would otherwise fall back to
    /// via `width_of`'s `Int` default.
    fn is_reference_compare(&self, left: &Operand, right: &Operand) -> bool {
        let is_ref = |t: &Type| matches!(t, Type::Struct(_) | Type::Array(_) | Type::Primitive(snow_semantic::PrimitiveType::Str));
        is_ref(&self.operand_type(left)) || is_ref(&self.operand_type(right))
    }

    fn compare_code(&self, op: CompareOp, width: Width, reference: bool) -> String {
        let w = if reference { "R" } else { width.mnemonic_suffix() };
        let suffix = match op {
            CompareOp::Eq => "EQ",
            CompareOp::Ne => "NE",
            CompareOp::Lt => "LT",
            CompareOp::Le => "LE",
            CompareOp::Gt => "GT",
            CompareOp::Ge => "GE",
        };
        format!("CMP_{}{}", w, suffix)
    }

    fn emit_new_array_literal(&mut self, slots: &mut SlotMap, dest: u32, items: &[ConstValue]) {
        self.emit(format!("NEW_ARRAY {} {}", dest, items.len()));
        for (i, item) in items.iter().enumerate() {
            let value_slot = self.scratch_slot(slots);
            self.emit(format!("LOAD_CONST {} {}", value_slot, const_operand_text(item)));
            let index_slot = self.scratch_slot(slots);
            self.emit(format!("LOAD_CONST {} {}", index_slot, i));
            self.emit(format!("PUSH {}", dest));
            self.emit(format!("PUSH {}", index_slot));
            self.emit(format!("PUSH {}", value_slot));
            self.emit(format!("CALL {} 3", quote("__setindex_r")));
        }
    }

    fn lower_call_like(&mut self, target: &str, arg_slots: &[u32], dest: Option<u32>) {
        for &slot in arg_slots {
            self.emit(format!("PUSH {}", slot));
        }
        self.emit(format!("CALL {} {}", quote(target), arg_slots.len()));
        if let Some(dest) = dest {
            self.emit(format!("POP {}", dest));
        }
    }

    /// Lowers one IR instruction. Returns true when it consumed `peek` too
    /// (a Compare/Unary-Not fused directly into the following JumpIfTrue),
    /// telling the caller to advance past both.
    fn lower_instruction(&mut self, slots: &mut SlotMap, instr: &Instruction, peek: Option<&Instruction>) -> bool {
        match instr {
            Instruction::LoadConst { dest, value: ConstValue::List(items) } => {
                let dest_slot = slots.slot_of(*dest);
                self.emit_new_array_literal(slots, dest_slot, items);
            }
            Instruction::LoadConst { dest, value } => {
                self.emit(format!("LOAD_CONST {} {}", slots.slot_of(*dest), const_operand_text(value)));
            }
            Instruction::Move { dest, src, width } => {
                let dest_slot = slots.slot_of(*dest);
                let src_slot = slots.slot_of(*src);
                if dest_slot != src_slot {
                    let zero = self.zero_slot_for(slots, *width);
                    self.emit(format!("ADD_{} {} {} {}", arith_width_code(*width), dest_slot, src_slot, zero));
                }
            }
            Instruction::Arith { op, width, dest, left, right } => {
                let l = self.operand_slot(slots, left);
                let r = self.operand_slot(slots, right);
                let mnemonic = match op {
                    ArithOp::Add => "ADD",
                    ArithOp::Sub => "SUB",
                    ArithOp::Mul => "MUL",
                    ArithOp::Div => "DIV",
                    ArithOp::Mod => "MOD",
                };
                self.emit(format!("{}_{} {} {} {}", mnemonic, arith_width_code(*width), slots.slot_of(*dest), l, r));
            }
            Instruction::Bitwise { op, dest, left, right } => {
                let l = self.operand_slot(slots, left);
                let r = self.operand_slot(slots, right);
                let mnemonic = match op {
                    BitOp::And => "AND",
                    BitOp::Or => "OR",
                    BitOp::Xor => "XOR",
                };
                self.emit(format!("{} {} {} {}", mnemonic, slots.slot_of(*dest), l, r));
            }
            Instruction::RefAdd { dest, left, right } => {
                let l = self.operand_slot(slots, left);
                let r = self.operand_slot(slots, right);
                self.emit(format!("ADD_R {} {} {}", slots.slot_of(*dest), l, r));
            }
            Instruction::Unary { op: UnaryIrOp::Neg, width, dest, operand } => {
                let o = self.operand_slot(slots, operand);
                self.emit(format!("NEG_{} {} {}", arith_width_code(*width), slots.slot_of(*dest), o));
            }
            Instruction::Unary { op: UnaryIrOp::Not, dest, operand, .. } => {
                // `!x` lowers to `x == 0` (spec §4.2). When the very next
                // instruction is a JumpIfTrue consuming this same register,
                // fuse directly into the conditional-jump form instead of
                // materializing the 0/1 result first.
                let o = self.operand_slot(slots, operand);
                let zero = self.operand_slot(slots, &Operand::Const(ConstValue::Int(0)));
                if let Some(Instruction::JumpIfTrue { label, condition: Operand::Register(cond) }) = peek {
                    if *cond == *dest {
                        self.emit(format!("CMP_IEQ {} {} L{}", o, zero, label.0));
                        return true;
                    }
                }
                self.emit(format!("CMP_IEQ {} {} {}", slots.slot_of(*dest), o, zero));
            }
            Instruction::Compare { op, width, dest, left, right } => {
                let reference = self.is_reference_compare(left, right);
                let l = self.operand_slot(slots, left);
                let r = self.operand_slot(slots, right);
                let code = self.compare_code(*op, *width, reference);
                if let Some(Instruction::JumpIfTrue { label, condition: Operand::Register(cond) }) = peek {
                    if *cond == *dest {
                        self.emit(format!("{}_JUMP {} {} L{}", code, l, r, label.0));
                        return true;
                    }
                }
                self.emit(format!("{} {} {} {}", code, slots.slot_of(*dest), l, r));
            }
            Instruction::Label(label) => self.emit(format!("LABEL L{}", label.0)),
            Instruction::Jump(label) => self.emit(format!("JUMP L{}", label.0)),
            Instruction::JumpIfTrue { label, condition } => {
                // Reached only when the producing instruction wasn't fused
                // above (e.g. the condition came from a Call or a plain
                // loaded register) — compare against zero explicitly.
                let c = self.operand_slot(slots, condition);
                let zero = self.operand_slot(slots, &Operand::Const(ConstValue::Int(0)));
                self.emit(format!("CMP_INE_JUMP {} {} L{}", c, zero, label.0));
            }
            Instruction::Call { dest, callee, args } => {
                let arg_slots: Vec<u32> = args.iter().map(|a| self.operand_slot(slots, a)).collect();
                let dest_slot = dest.map(|d| slots.slot_of(d));
                self.lower_call_like(callee, &arg_slots, dest_slot);
            }
            Instruction::Syscall { dest, subcommand, args } => {
                let sub_slot = self.operand_slot(slots, subcommand);
                let mut all = vec![sub_slot];
                all.extend(args.iter().map(|a| self.operand_slot(slots, a)));
                for &slot in &all {
                    self.emit(format!("PUSH {}", slot));
                }
                self.emit(format!("SYSCALL {}", all.len()));
                if let Some(dest) = dest {
                    self.emit(format!("POP {}", slots.slot_of(*dest)));
                }
            }
            Instruction::Return(value) => match value {
                None => self.emit("RET"),
                Some(op) => {
                    let slot = self.operand_slot(slots, op);
                    self.emit(format!("RET_V {}", slot))
                }
            },
            Instruction::NewStruct { dest, struct_name, ctor, args } => {
                let field_count = self.tables.struct_layout(struct_name).map(|l| l.fields.len()).unwrap_or(0);
                let dest_slot = slots.slot_of(*dest);
                self.emit(format!("NEW_STRUCT {} {} {}", dest_slot, quote(struct_name), field_count));
                let mut arg_slots = vec![dest_slot];
                arg_slots.extend(args.iter().map(|a| self.operand_slot(slots, a)));
                self.lower_call_like(ctor, &arg_slots, None);
            }
            Instruction::LoadField { dest, object, slot, .. } => {
                // Member reads always use the generic reference channel
                // (spec §4.2: "emit a struct-field load via `__index_r`"),
                // unlike field *stores*, which are channel-typed below.
                let obj = self.operand_slot(slots, object);
                let idx = self.operand_slot(slots, &Operand::Const(ConstValue::Int(*slot as i32)));
                let dest_slot = slots.slot_of(*dest);
                self.lower_call_like("__index_r", &[obj, idx], Some(dest_slot));
            }
            Instruction::StoreField { object, struct_name, slot, value } => {
                let obj = self.operand_slot(slots, object);
                let idx = self.operand_slot(slots, &Operand::Const(ConstValue::Int(*slot as i32)));
                let val = self.operand_slot(slots, value);
                let suffix = typed_channel_suffix(&self.field_type(struct_name, *slot));
                self.lower_call_like(&format!("__setindex_{}", suffix), &[obj, idx, val], None);
            }
            Instruction::NewArray { dest, elements } => {
                let dest_slot = slots.slot_of(*dest);
                self.emit(format!("NEW_ARRAY {} {}", dest_slot, elements.len()));
                for (i, elem) in elements.iter().enumerate() {
                    let val = self.operand_slot(slots, elem);
                    let idx = self.operand_slot(slots, &Operand::Const(ConstValue::Int(i as i32)));
                    self.lower_call_like("__setindex_r", &[dest_slot, idx, val], None);
                }
            }
            Instruction::LoadIndex { dest, array, index } => {
                let suffix = typed_channel_suffix(&self.element_type(array));
                let arr = self.operand_slot(slots, array);
                let idx = self.operand_slot(slots, index);
                let dest_slot = slots.slot_of(*dest);
                self.lower_call_like(&format!("__index_{}", suffix), &[arr, idx], Some(dest_slot));
            }
            Instruction::StoreIndex { array, index, value } => {
                let suffix = typed_channel_suffix(&self.element_type(array));
                let arr = self.operand_slot(slots, array);
                let idx = self.operand_slot(slots, index);
                let val = self.operand_slot(slots, value);
                self.lower_call_like(&format!("__setindex_{}", suffix), &[arr, idx, val], None);
            }
        }
        false
    }
}

/// Emits one function's body as `.water` lines, headed by a `FUNC` marker
/// the VM's loader resolves `CALL` targets against (spec §4.7/§4.8 do not
/// name a function-boundary opcode explicitly; `FUNC` fills that gap the
/// same way `LABEL` fills it for intra-function jumps — see DESIGN.md).
pub fn emit_function(function: &IrFunction, slots: &mut SlotMap, tables: &ProgramTables) -> Vec<String> {
    let mut out = vec![format!("FUNC {} {}", quote(&function.name), function.params.len())];
    let mut fe = FuncEmitter::new(tables, &function.register_types);
    let body = &function.body;
    let mut i = 0;
    while i < body.len() {
        let peek = body.get(i + 1);
        let fused = fe.lower_instruction(slots, &body[i], peek);
        i += if fused { 2 } else { 1 };
    }
    out.extend(fe.lines);
    out
}

/// Emits the whole program: one `FUNC` block per function, entry function
/// first (already guaranteed by `IrProgram`'s entry normalization).
pub fn emit_program(program: &IrProgram, slot_maps: &mut HashMap<String, SlotMap>) -> String {
    let mut lines = Vec::new();
    for function in &program.functions {
        let slots = slot_maps.entry(function.name.clone()).or_insert_with(|| crate::alloc::RegisterAllocator::allocate(function));
        lines.extend(emit_function(function, slots, &program.tables));
    }
    lines.join("\n")
}
