//! Process/Thread family (spec §4.9, §5 "Each THREAD_CREATE spawns an OS
//! thread ... sharing only the process-wide registries"). `THREAD_CREATE`
//! is the one handler in this table that needs the running [`Interp`]
//! rather than just the shared registries, since the new thread gets a
//! brand-new `Interp` cloned from the same [`VmShared`].

use std::thread;
use std::time::Duration;

use snow_common::{SnowError, SnowResult};

use super::{arg, arg_i64, arg_str};
use crate::core::{Interp, VmShared};
use crate::value::Value;

pub fn dispatch(shared: &VmShared, interp: &mut Interp, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "EXIT" => {
            let code = arg_i64(args, 0)? as i32;
            std::process::exit(code);
        }
        "FORK" | "EXEC" => Err(SnowError::syscall_error(format!("`{}` is not supported by this VM", name))),
        "PROC_WAIT" => {
            // No child-process table is modeled (no FORK to produce one);
            // documented as an always-succeeds no-op rather than an error so
            // a program that unconditionally reaps after EXEC-less spawns
            // doesn't abort.
            Ok(Value::Int(0))
        }
        "GETPID" => Ok(Value::Long(std::process::id() as i64)),
        "GETPPID" => Ok(Value::Long(0)),
        "THREAD_CREATE" => {
            let entry = arg_str(args, 0)?;
            let thread_arg = arg(args, 1)?.clone();
            let shared = shared.clone();
            let handle = thread::spawn(move || match Interp::new(shared).call(&entry, vec![thread_arg]) {
                Ok(v) => v.unwrap_or(Value::Null),
                Err(e) => Value::Str(std::sync::Arc::new(e.to_string())),
            });
            Ok(Value::Long(interp.shared.registries.threads.insert(handle)))
        }
        "THREAD_JOIN" => {
            let tid = arg_i64(args, 0)?;
            let handle = interp
                .shared
                .registries
                .threads
                .remove(tid)
                .ok_or_else(|| SnowError::syscall_error(format!("invalid thread id {}", tid)))?;
            handle.join().map_err(|_| SnowError::runtime_error(format!("thread {} panicked", tid)))
        }
        "SLEEP" => {
            let ms = arg_i64(args, 0)?;
            thread::sleep(Duration::from_millis(ms.max(0) as u64));
            Ok(Value::Int(0))
        }
        other => Err(SnowError::syscall_error(format!("unhandled process/thread syscall `{}`", other))),
    }
}
