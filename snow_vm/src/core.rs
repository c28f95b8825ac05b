//! The stack machine (spec §4.8): operand stack, per-frame local store, call
//! stack, and the dispatch loop. One [`Interp`] runs one OS thread's worth
//! of execution; [`Vm`] owns the process-wide state ([`Registries`], the
//! parsed [`Program`]) that every thread shares.

use std::sync::{Arc, Mutex};

use log::trace;
use snow_common::{SnowError, SnowResult};

use crate::instr::{ArithKind, BitKind, CmpOp, CmpWidth, ConstLit, Instr, NumWidth};
use crate::parser::{FunctionCode, Program};
use crate::registry::Registries;
use crate::value::Value;

/// State shared by every thread of one running program — cloned (cheaply,
/// via `Arc`) into each `THREAD_CREATE`d OS thread.
#[derive(Clone)]
pub struct VmShared {
    pub program: Arc<Program>,
    pub registries: Arc<Registries>,
    pub trace: bool,
}

pub struct Vm {
    shared: VmShared,
}

impl Vm {
    pub fn new(program: Program, trace: bool) -> Self {
        Vm { shared: VmShared { program: Arc::new(program), registries: Arc::new(Registries::default()), trace } }
    }

    /// Runs the entry function (index 0 after `snow_ir`'s entry
    /// normalization) on the calling (main) thread to completion, returning
    /// whatever it `RET_V`s.
    pub fn run(&self) -> SnowResult<Option<Value>> {
        let entry = self.shared.program.entry()?.name.clone();
        Interp::new(self.shared.clone()).call(&entry, Vec::new())
    }
}

struct Frame {
    func_name: Arc<str>,
    pc: usize,
    locals: Vec<Value>,
    stack_base: usize,
}

/// One thread's execution context: a private operand stack and call stack,
/// a reference to the process-wide shared state (spec §5: "Each
/// `THREAD_CREATE` spawns an OS thread with its own operand stack, local
/// store, and call stack, sharing only the process-wide registries").
pub struct Interp {
    pub shared: VmShared,
    stack: Vec<Value>,
    frames: Vec<Frame>,
}

fn get_local(locals: &[Value], slot: u32) -> SnowResult<Value> {
    locals.get(slot as usize).cloned().ok_or_else(|| SnowError::runtime_error(format!("read from unassigned slot {}", slot)))
}

fn set_local(locals: &mut Vec<Value>, slot: u32, value: Value) {
    let i = slot as usize;
    if i >= locals.len() {
        locals.resize(i + 1, Value::Null);
    }
    locals[i] = value;
}

fn const_lit_value(c: &ConstLit) -> Value {
    match c {
        ConstLit::Int(i) => Value::Long(*i),
        ConstLit::Float(f) => Value::Double(*f),
        ConstLit::Str(s) => Value::Str(Arc::new(s.clone())),
    }
}

fn arith_value(kind: ArithKind, width: NumWidth, l: &Value, r: &Value) -> SnowResult<Value> {
    if width.is_float() {
        let a = l.as_f64().ok_or_else(|| SnowError::runtime_error("arithmetic on a non-numeric value"))?;
        let b = r.as_f64().ok_or_else(|| SnowError::runtime_error("arithmetic on a non-numeric value"))?;
        let res = match kind {
            ArithKind::Add => a + b,
            ArithKind::Sub => a - b,
            ArithKind::Mul => a * b,
            ArithKind::Div => a / b,
            ArithKind::Mod => a % b,
            ArithKind::Neg => unreachable!("Neg is dispatched separately"),
        };
        return Ok(match width {
            NumWidth::F32 => Value::Float(res as f32),
            NumWidth::F64 => Value::Double(res),
            _ => unreachable!(),
        });
    }
    let a = l.as_i64().ok_or_else(|| SnowError::runtime_error("arithmetic on a non-numeric value"))?;
    let b = r.as_i64().ok_or_else(|| SnowError::runtime_error("arithmetic on a non-numeric value"))?;
    let res = match kind {
        ArithKind::Add => a.wrapping_add(b),
        ArithKind::Sub => a.wrapping_sub(b),
        ArithKind::Mul => a.wrapping_mul(b),
        ArithKind::Div => {
            if b == 0 {
                return Err(SnowError::runtime_error("division by zero"));
            }
            a.wrapping_div(b)
        }
        ArithKind::Mod => {
            if b == 0 {
                return Err(SnowError::runtime_error("division by zero"));
            }
            a.wrapping_rem(b)
        }
        ArithKind::Neg => unreachable!(),
    };
    Ok(match width {
        NumWidth::I8 => Value::Byte(res as i8),
        NumWidth::I16 => Value::Short(res as i16),
        NumWidth::I32 => Value::Int(res as i32),
        NumWidth::I64 => Value::Long(res),
        _ => unreachable!(),
    })
}

fn neg_value(width: NumWidth, v: &Value) -> SnowResult<Value> {
    if width.is_float() {
        let a = v.as_f64().ok_or_else(|| SnowError::runtime_error("negate on a non-numeric value"))?;
        return Ok(match width {
            NumWidth::F32 => Value::Float(-a as f32),
            NumWidth::F64 => Value::Double(-a),
            _ => unreachable!(),
        });
    }
    let a = v.as_i64().ok_or_else(|| SnowError::runtime_error("negate on a non-numeric value"))?;
    Ok(match width {
        NumWidth::I8 => Value::Byte((-a) as i8),
        NumWidth::I16 => Value::Short((-a) as i16),
        NumWidth::I32 => Value::Int((-a) as i32),
        NumWidth::I64 => Value::Long(-a),
        _ => unreachable!(),
    })
}

fn ref_add(l: &Value, r: &Value) -> SnowResult<Value> {
    match (l, r) {
        (Value::List(a), Value::List(b)) => {
            let mut out = a.lock().unwrap().clone();
            out.extend(b.lock().unwrap().iter().cloned());
            Ok(Value::List(Arc::new(Mutex::new(out))))
        }
        _ => Ok(Value::Str(Arc::new(format!("{}{}", l.display(), r.display())))),
    }
}

fn compare(width: CmpWidth, op: CmpOp, l: &Value, r: &Value) -> SnowResult<bool> {
    if width == CmpWidth::Reference {
        let eq = l.ref_eq(r);
        return match op {
            CmpOp::Eq => Ok(eq),
            CmpOp::Ne => Ok(!eq),
            _ => Err(SnowError::runtime_error("ordering comparison on a reference-equality operand")),
        };
    }
    if matches!(width, CmpWidth::Float | CmpWidth::Double) {
        let a = l.as_f64().ok_or_else(|| SnowError::runtime_error("compare on a non-numeric value"))?;
        let b = r.as_f64().ok_or_else(|| SnowError::runtime_error("compare on a non-numeric value"))?;
        return Ok(apply_cmp(op, a.partial_cmp(&b)));
    }
    let a = l.as_i64().ok_or_else(|| SnowError::runtime_error("compare on a non-numeric value"))?;
    let b = r.as_i64().ok_or_else(|| SnowError::runtime_error("compare on a non-numeric value"))?;
    Ok(apply_cmp(op, a.partial_cmp(&b)))
}

fn apply_cmp(op: CmpOp, ord: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ord) {
        (CmpOp::Eq, Some(Equal)) => true,
        (CmpOp::Ne, Some(o)) => o != Equal,
        (CmpOp::Lt, Some(Less)) => true,
        (CmpOp::Le, Some(Less | Equal)) => true,
        (CmpOp::Gt, Some(Greater)) => true,
        (CmpOp::Ge, Some(Greater | Equal)) => true,
        _ => false,
    }
}

fn bitwise(op: BitKind, l: &Value, r: &Value) -> SnowResult<Value> {
    let a = l.as_i64().ok_or_else(|| SnowError::runtime_error("bitwise op on a non-integer value"))?;
    let b = r.as_i64().ok_or_else(|| SnowError::runtime_error("bitwise op on a non-integer value"))?;
    Ok(Value::Long(match op {
        BitKind::And => a & b,
        BitKind::Or => a | b,
        BitKind::Xor => a ^ b,
    }))
}

impl Interp {
    pub fn new(shared: VmShared) -> Self {
        Interp { shared, stack: Vec::new(), frames: Vec::new() }
    }

    fn current_func(&self) -> SnowResult<Arc<FunctionCode>> {
        let name = self.frames.last().unwrap().func_name.clone();
        self.shared
            .program
            .functions
            .get(&*name)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| SnowError::runtime_error(format!("unresolved call target `{}`", name)))
    }

    /// Invokes `name` with `args` already in parameter order, running until
    /// it returns, and yields whatever `RET_V` produced (or `None` for a
    /// bare `RET`). Reserved builtins (the `__index_*`/`__setindex_*`
    /// channel family) are handled inline without pushing a frame.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> SnowResult<Option<Value>> {
        if let Some(result) = crate::builtins::try_call(name, &args)? {
            return Ok(Some(result));
        }
        let stack_base = self.stack.len();
        self.frames.push(Frame { func_name: Arc::from(name), pc: 0, locals: args, stack_base });
        let base_depth = self.frames.len() - 1;
        self.run_until(base_depth)?;
        if self.stack.len() > stack_base {
            Ok(self.stack.pop())
        } else {
            Ok(None)
        }
    }

    /// Runs until the frame at `base_depth` (and everything above it) has
    /// returned.
    fn run_until(&mut self, base_depth: usize) -> SnowResult<()> {
        loop {
            if self.frames.len() <= base_depth {
                return Ok(());
            }
            let func = self.current_func()?;
            let pc = self.frames.last().unwrap().pc;
            let Some(instr) = func.instructions.get(pc).cloned() else {
                return Err(SnowError::runtime_error(format!("program counter ran off the end of `{}`", func.name)));
            };
            if self.shared.trace {
                trace!("{}:{} {:?}", func.name, pc, instr);
            }
            self.frames.last_mut().unwrap().pc += 1;
            self.step(&func, instr)?;
        }
    }

    fn locals_mut(&mut self) -> &mut Vec<Value> {
        &mut self.frames.last_mut().unwrap().locals
    }

    fn step(&mut self, func: &FunctionCode, instr: Instr) -> SnowResult<()> {
        match instr {
            Instr::LoadConst { dest, value } => {
                let v = const_lit_value(&value);
                set_local(self.locals_mut(), dest, v);
            }
            Instr::Arith { kind, width, dest, left, right } => {
                let l = get_local(&self.frames.last().unwrap().locals, left)?;
                let r = get_local(&self.frames.last().unwrap().locals, right)?;
                let v = arith_value(kind, width, &l, &r)?;
                set_local(self.locals_mut(), dest, v);
            }
            Instr::Neg { width, dest, operand } => {
                let v = get_local(&self.frames.last().unwrap().locals, operand)?;
                let v = neg_value(width, &v)?;
                set_local(self.locals_mut(), dest, v);
            }
            Instr::RefAdd { dest, left, right } => {
                let l = get_local(&self.frames.last().unwrap().locals, left)?;
                let r = get_local(&self.frames.last().unwrap().locals, right)?;
                let v = ref_add(&l, &r)?;
                set_local(self.locals_mut(), dest, v);
            }
            Instr::Bitwise { op, dest, left, right } => {
                let l = get_local(&self.frames.last().unwrap().locals, left)?;
                let r = get_local(&self.frames.last().unwrap().locals, right)?;
                let v = bitwise(op, &l, &r)?;
                set_local(self.locals_mut(), dest, v);
            }
            Instr::Cmp { width, op, dest, left, right } => {
                let l = get_local(&self.frames.last().unwrap().locals, left)?;
                let r = get_local(&self.frames.last().unwrap().locals, right)?;
                let result = compare(width, op, &l, &r)?;
                set_local(self.locals_mut(), dest, Value::Bool(result));
            }
            Instr::CmpJump { width, op, left, right, target } => {
                let l = get_local(&self.frames.last().unwrap().locals, left)?;
                let r = get_local(&self.frames.last().unwrap().locals, right)?;
                if compare(width, op, &l, &r)? {
                    self.frames.last_mut().unwrap().pc = target;
                }
            }
            Instr::Jump { target } => {
                self.frames.last_mut().unwrap().pc = target;
            }
            Instr::Push { slot } => {
                let v = get_local(&self.frames.last().unwrap().locals, slot)?;
                self.stack.push(v);
            }
            Instr::Pop { slot } => {
                let v = self.stack.pop().ok_or_else(|| SnowError::runtime_error("operand stack underflow on POP"))?;
                set_local(self.locals_mut(), slot, v);
            }
            Instr::Call { target, argc } => {
                self.do_call(&target, argc)?;
            }
            Instr::Syscall { argc } => {
                self.do_syscall(argc)?;
            }
            Instr::Ret => {
                self.do_return(None)?;
            }
            Instr::RetV { slot } => {
                let v = get_local(&self.frames.last().unwrap().locals, slot)?;
                self.do_return(Some(v))?;
            }
            Instr::NewArray { dest, count } => {
                let list = vec![Value::Null; count as usize];
                set_local(self.locals_mut(), dest, Value::List(Arc::new(Mutex::new(list))));
            }
            Instr::NewStruct { dest, name, field_count } => {
                let fields = vec![Value::Null; field_count as usize];
                set_local(self.locals_mut(), dest, Value::Struct(name.into(), Arc::new(Mutex::new(fields))));
            }
        }
        let _ = func;
        Ok(())
    }

    fn do_call(&mut self, target: &str, argc: u32) -> SnowResult<()> {
        if self.stack.len() < argc as usize {
            return Err(SnowError::runtime_error("operand stack underflow on CALL"));
        }
        let mut args = self.stack.split_off(self.stack.len() - argc as usize);
        args.reverse();
        if let Some(result) = crate::builtins::try_call(target, &args)? {
            self.stack.push(result);
            return Ok(());
        }
        let stack_base = self.stack.len();
        self.frames.push(Frame { func_name: Arc::from(target), pc: 0, locals: args, stack_base });
        Ok(())
    }

    fn do_syscall(&mut self, argc: u32) -> SnowResult<()> {
        if self.stack.len() < argc as usize {
            return Err(SnowError::runtime_error("operand stack underflow on SYSCALL"));
        }
        let mut popped = self.stack.split_off(self.stack.len() - argc as usize);
        popped.reverse();
        let (subcommand, args) = popped.split_first().ok_or_else(|| SnowError::runtime_error("SYSCALL with no subcommand"))?;
        let name = subcommand.as_str().ok_or_else(|| SnowError::runtime_error("syscall subcommand must be a string"))?;
        let name = name.to_string();
        let args = args.to_vec();
        let shared = self.shared.clone();
        let result = crate::syscalls::dispatch(&shared, self, &name, &args)?;
        self.stack.push(result);
        Ok(())
    }

    fn do_return(&mut self, value: Option<Value>) -> SnowResult<()> {
        let frame = self.frames.pop().ok_or_else(|| SnowError::runtime_error("RET with no active frame"))?;
        self.stack.truncate(frame.stack_base);
        if let Some(v) = value {
            self.stack.push(v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn run_source(src: &str) -> SnowResult<Option<Value>> {
        let program = parse_program(src)?;
        Vm::new(program, false).run()
    }

    #[test]
    fn factorial_of_six_leaves_720() {
        // Slot 0 is the parameter `n`; slot 1 is the accumulator, slot 2 the
        // loop counter `i`, slot 3 a scratch for `i+1`.
        let src = r#"
FUNC "Math.factorial" 1
LOAD_CONST 1 1
LOAD_CONST 2 1
LABEL L0
CMP_ILE_JUMP 2 0 L1
JUMP L2
LABEL L1
MUL_I32 1 1 2
LOAD_CONST 3 1
ADD_I32 2 2 3
JUMP L0
LABEL L2
RET_V 1
"#;
        let program = parse_program(src).unwrap();
        let mut interp = Interp::new(VmShared { program: Arc::new(program), registries: Arc::new(Registries::default()), trace: false });
        let v = interp.call("Math.factorial", vec![Value::Int(6)]).unwrap();
        assert_eq!(v.unwrap().as_i64(), Some(720));
    }

    #[test]
    fn string_concatenation_scenario() {
        let src = r#"
FUNC "Math.main" 0
LOAD_CONST 0 "a"
LOAD_CONST 1 1
ADD_R 2 0 1
LOAD_CONST 3 "b"
ADD_R 4 2 3
RET_V 4
"#;
        let result = run_source(src).unwrap().unwrap();
        assert_eq!(result.as_str(), Some("a1b"));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let src = r#"
FUNC "Math.main" 0
LOAD_CONST 0 1
LOAD_CONST 1 0
DIV_I32 2 0 1
RET_V 2
"#;
        assert!(run_source(src).is_err());
    }
}
