//! System info family (spec §4.9): host environment queries with no
//! registry of their own.

use snow_common::{SnowError, SnowResult};

use super::arg_str;
use crate::value::Value;

pub fn dispatch(name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "GETENV" => {
            let key = arg_str(args, 0)?;
            Ok(match std::env::var(&key) {
                Ok(v) => Value::Str(std::sync::Arc::new(v)),
                Err(_) => Value::Null,
            })
        }
        "SETENV" => {
            let key = arg_str(args, 0)?;
            let value = arg_str(args, 1)?;
            std::env::set_var(&key, &value);
            Ok(Value::Int(0))
        }
        "NCPU" => Ok(Value::Int(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as i32)),
        "RANDOM_BYTES" => {
            let n = super::arg_i64(args, 0)? as usize;
            let mut buf = vec![0u8; n];
            // No external RNG crate in the teacher's dependency stack;
            // reseed from the hashed process/thread id, same rough-entropy
            // role `RANDOM_BYTES`'s contract needs at the syscall layer
            // rather than a cryptographic one.
            let mut seed = std::collections::hash_map::DefaultHasher::new();
            use std::hash::{Hash, Hasher};
            std::time::SystemTime::now().hash(&mut seed);
            std::thread::current().id().hash(&mut seed);
            let mut state = seed.finish();
            for b in buf.iter_mut() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                *b = (state >> 33) as u8;
            }
            Ok(super::bytes_to_value(&buf))
        }
        "ERRNO" => Ok(Value::Int(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))),
        "ERRSTR" => Ok(Value::Str(std::sync::Arc::new(std::io::Error::last_os_error().to_string()))),
        "MEMINFO" => {
            // No portable `std` API for process RSS; reports only what's
            // host-independent. A real deployment would shell out to
            // `/proc/self/statm` on Linux, left undone since it's
            // platform-specific beyond this spec's scope.
            let fields = vec![Value::Long(0), Value::Long(0)];
            Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(fields))))
        }
        other => Err(SnowError::syscall_error(format!("unhandled system-info syscall `{}`", other))),
    }
}
