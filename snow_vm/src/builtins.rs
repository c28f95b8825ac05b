//! The reserved `CALL` targets the backend lowers struct-field/array
//! access to (spec §3's invariants name `__index_*`/`__setindex_*` as
//! reserved). `snow_backend::emitter` picks one of the seven channel
//! letters — `b`/`s`/`i`/`l`/`f`/`d` for a declared primitive width, `r`
//! for everything else (spec §4.2/§4.3) — and this module is the VM side
//! of that dispatch: a typed channel coerces the value on its way in or
//! out, narrowing a runtime `int` down to the declared `byte`/`short`
//! width the way an explicit store would (DESIGN.md's Open Question
//! decision #2). Checked before a user-defined function table lookup in
//! [`crate::core::Interp::call`]/`do_call`.

use snow_common::{SnowError, SnowResult};

use crate::value::Value;

pub fn try_call(name: &str, args: &[Value]) -> SnowResult<Option<Value>> {
    if let Some(channel) = name.strip_prefix("__index_") {
        let raw = index_get(args)?;
        return Ok(Some(coerce_channel(channel, raw)?));
    }
    if let Some(channel) = name.strip_prefix("__setindex_") {
        let [obj, idx, value] = args else {
            return Err(SnowError::runtime_error("__setindex_* expects (object, index, value)"));
        };
        let coerced = coerce_channel(channel, value.clone())?;
        index_set(&[obj.clone(), idx.clone(), coerced])?;
        return Ok(Some(Value::Null));
    }
    Ok(None)
}

/// Narrows/widens `value` to the declared-type channel a typed
/// `__index_*`/`__setindex_*` call was dispatched on. `r` (the generic
/// reference channel used for strings, structs, arrays, and `any`) is a
/// pass-through; the six primitive channels truncate/convert the same way
/// a typed store instruction would.
fn coerce_channel(channel: &str, value: Value) -> SnowResult<Value> {
    match channel {
        "b" => {
            let i = value.as_i64().ok_or_else(|| SnowError::runtime_error("byte channel requires a numeric value"))?;
            Ok(Value::Byte(i as i8))
        }
        "s" => {
            let i = value.as_i64().ok_or_else(|| SnowError::runtime_error("short channel requires a numeric value"))?;
            Ok(Value::Short(i as i16))
        }
        "i" => {
            let i = value.as_i64().ok_or_else(|| SnowError::runtime_error("int channel requires a numeric value"))?;
            Ok(Value::Int(i as i32))
        }
        "l" => {
            let i = value.as_i64().ok_or_else(|| SnowError::runtime_error("long channel requires a numeric value"))?;
            Ok(Value::Long(i))
        }
        "f" => {
            let f = value.as_f64().ok_or_else(|| SnowError::runtime_error("float channel requires a numeric value"))?;
            Ok(Value::Float(f as f32))
        }
        "d" => {
            let f = value.as_f64().ok_or_else(|| SnowError::runtime_error("double channel requires a numeric value"))?;
            Ok(Value::Double(f))
        }
        "r" => Ok(value),
        other => Err(SnowError::runtime_error(format!("unknown index channel '{}'", other))),
    }
}

fn index_get(args: &[Value]) -> SnowResult<Value> {
    let [obj, idx] = args else {
        return Err(SnowError::runtime_error("__index_* expects (object, index)"));
    };
    let list = obj.as_list().ok_or_else(|| SnowError::runtime_error("indexed a non-array/struct value"))?;
    let i = idx.as_i64().ok_or_else(|| SnowError::runtime_error("index must be numeric"))?;
    let borrowed = list.lock().unwrap();
    let i = usize::try_from(i).map_err(|_| SnowError::runtime_error("negative index"))?;
    borrowed.get(i).cloned().ok_or_else(|| SnowError::runtime_error(format!("index {} out of bounds (len {})", i, borrowed.len())))
}

fn index_set(args: &[Value]) -> SnowResult<()> {
    let [obj, idx, value] = args else {
        return Err(SnowError::runtime_error("__setindex_* expects (object, index, value)"));
    };
    let list = obj.as_list().ok_or_else(|| SnowError::runtime_error("indexed a non-array/struct value"))?;
    let i = idx.as_i64().ok_or_else(|| SnowError::runtime_error("index must be numeric"))?;
    let mut borrowed = list.lock().unwrap();
    let i = usize::try_from(i).map_err(|_| SnowError::runtime_error("negative index"))?;
    if i >= borrowed.len() {
        return Err(SnowError::runtime_error(format!("index {} out of bounds (len {})", i, borrowed.len())));
    }
    borrowed[i] = value.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn index_get_reads_the_slot() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Int(10), Value::Int(20)])));
        let v = try_call("__index_r", &[list, Value::Int(1)]).unwrap().unwrap();
        assert_eq!(v.as_i64(), Some(20));
    }

    #[test]
    fn index_set_writes_the_slot() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Int(0); 3])));
        try_call("__setindex_r", &[list.clone(), Value::Int(2), Value::Int(99)]).unwrap();
        assert_eq!(list.as_list().unwrap().lock().unwrap()[2].as_i64(), Some(99));
    }

    #[test]
    fn index_get_out_of_bounds_errors() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Int(0)])));
        assert!(try_call("__index_r", &[list, Value::Int(5)]).is_err());
    }

    #[test]
    fn setindex_b_truncates_a_runtime_int_to_byte_width() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Byte(0)])));
        try_call("__setindex_b", &[list.clone(), Value::Int(0), Value::Int(200)]).unwrap();
        let stored = list.as_list().unwrap().lock().unwrap()[0].clone();
        assert!(matches!(stored, Value::Byte(v) if v == 200i32 as i8));
    }

    #[test]
    fn index_d_widens_a_stored_int_to_double() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Int(7)])));
        let v = try_call("__index_d", &[list, Value::Int(0)]).unwrap().unwrap();
        assert!(matches!(v, Value::Double(d) if d == 7.0));
    }

    #[test]
    fn unknown_channel_errors() {
        let list = Value::List(Arc::new(Mutex::new(vec![Value::Int(0)])));
        assert!(try_call("__index_z", &[list, Value::Int(0)]).is_err());
    }
}
