//! Array family (spec §4.9): the syscall-level view of the same list-backed
//! representation `__index_r`/`__setindex_r` manipulate directly (spec §3's
//! invariants). Per spec: "numbers and booleans are pushed as integers,
//! other values pushed as-is" — `ARR_GET` narrows a numeric/bool element to
//! a plain `Value::Int` rather than preserving its original width tag.

use snow_common::{SnowError, SnowResult};

use super::{arg, arg_i64};
use crate::value::Value;

fn as_array_channel(v: Value) -> Value {
    match v {
        Value::Byte(n) => Value::Int(n as i32),
        Value::Short(n) => Value::Int(n as i32),
        Value::Long(n) => Value::Int(n as i32),
        Value::Bool(b) => Value::Int(b as i32),
        other => other,
    }
}

pub fn dispatch(name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "ARR_LEN" => {
            let list = arg(args, 0)?.as_list().ok_or_else(|| SnowError::syscall_error("ARR_LEN on a non-array value"))?;
            Ok(Value::Int(list.lock().unwrap().len() as i32))
        }
        "ARR_GET" => {
            let list = arg(args, 0)?.as_list().ok_or_else(|| SnowError::syscall_error("ARR_GET on a non-array value"))?;
            let i = arg_i64(args, 1)? as usize;
            let borrowed = list.lock().unwrap();
            let v = borrowed.get(i).cloned().ok_or_else(|| SnowError::syscall_error(format!("ARR_GET index {} out of bounds", i)))?;
            Ok(as_array_channel(v))
        }
        "ARR_SET" => {
            let list = arg(args, 0)?.as_list().ok_or_else(|| SnowError::syscall_error("ARR_SET on a non-array value"))?;
            let i = arg_i64(args, 1)? as usize;
            let value = arg(args, 2)?.clone();
            let mut borrowed = list.lock().unwrap();
            if i >= borrowed.len() {
                return Err(SnowError::syscall_error(format!("ARR_SET index {} out of bounds", i)));
            }
            borrowed[i] = value;
            Ok(Value::Int(0))
        }
        "ARR_REMOVE" => {
            let list = arg(args, 0)?.as_list().ok_or_else(|| SnowError::syscall_error("ARR_REMOVE on a non-array value"))?;
            let i = arg_i64(args, 1)? as usize;
            let mut borrowed = list.lock().unwrap();
            if i >= borrowed.len() {
                return Err(SnowError::syscall_error(format!("ARR_REMOVE index {} out of bounds", i)));
            }
            Ok(as_array_channel(borrowed.remove(i)))
        }
        other => Err(SnowError::syscall_error(format!("unhandled array syscall `{}`", other))),
    }
}
