//! Sync family (spec §4.9, §5): mutexes, condition variables, counting
//! semaphores, and reader/writer locks, each backed by its own
//! [`Registry`] in [`Registries`]. `COND_WAIT` is the one handler that
//! touches two registries at once — the mutex being released/reacquired
//! and the condvar being slept on (spec §5: "Condition-variable `wait`
//! must atomically release the associated mutex and reacquire it on
//! wake").

use std::sync::Condvar;

use snow_common::{SnowError, SnowResult};

use super::arg_i64;
use crate::registry::{MutexResource, RwLockResource, SemResource, Registries};
use crate::value::Value;

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "MUTEX_NEW" => Ok(Value::Long(registries.mutexes.insert(MutexResource::default()))),
        "LOCK" => {
            let id = arg_i64(args, 0)?;
            registries.mutexes.with(id, |m| m.lock()).ok_or_else(|| invalid("mutex", id))?;
            Ok(Value::Int(0))
        }
        "TRYLOCK" => {
            let id = arg_i64(args, 0)?;
            let got = registries.mutexes.with(id, |m| m.try_lock()).ok_or_else(|| invalid("mutex", id))?;
            Ok(Value::Int(got as i32))
        }
        "UNLOCK" => {
            let id = arg_i64(args, 0)?;
            registries.mutexes.with(id, |m| m.unlock()).ok_or_else(|| invalid("mutex", id))?;
            Ok(Value::Int(0))
        }
        "COND_NEW" => Ok(Value::Long(registries.conds.insert(Condvar::new()))),
        "COND_WAIT" => {
            let mutex_id = arg_i64(args, 0)?;
            let cond_id = arg_i64(args, 1)?;
            let timeout_ms = args.get(2).and_then(Value::as_i64).unwrap_or(-1);
            let woke = registries
                .mutexes
                .with(mutex_id, |m| registries.conds.with(cond_id, |c| m.wait_on(c, timeout_ms)).ok_or_else(|| invalid("cond", cond_id)))
                .ok_or_else(|| invalid("mutex", mutex_id))??;
            Ok(Value::Int(woke as i32))
        }
        "SIGNAL" => {
            let id = arg_i64(args, 0)?;
            registries.conds.with(id, |c| c.notify_one()).ok_or_else(|| invalid("cond", id))?;
            Ok(Value::Int(0))
        }
        "BROADCAST" => {
            let id = arg_i64(args, 0)?;
            registries.conds.with(id, |c| c.notify_all()).ok_or_else(|| invalid("cond", id))?;
            Ok(Value::Int(0))
        }
        "SEM_NEW" => {
            let initial = arg_i64(args, 0)?;
            Ok(Value::Long(registries.sems.insert(SemResource::new(initial))))
        }
        "SEM_WAIT" => {
            let id = arg_i64(args, 0)?;
            let timeout_ms = args.get(1).and_then(Value::as_i64).unwrap_or(-1);
            let got = registries.sems.with(id, |s| s.wait(timeout_ms)).ok_or_else(|| invalid("semaphore", id))?;
            // In-band convention (spec §7.3): timeout/interrupt return -1.
            Ok(if got { Value::Int(0) } else { Value::Long(-1) })
        }
        "POST" => {
            let id = arg_i64(args, 0)?;
            registries.sems.with(id, |s| s.post()).ok_or_else(|| invalid("semaphore", id))?;
            Ok(Value::Int(0))
        }
        "RWLOCK_NEW" => Ok(Value::Long(registries.rwlocks.insert(RwLockResource::default()))),
        "RLOCK" => {
            let id = arg_i64(args, 0)?;
            registries.rwlocks.with(id, |rw| rw.rlock()).ok_or_else(|| invalid("rwlock", id))?;
            Ok(Value::Int(0))
        }
        "WLOCK" => {
            let id = arg_i64(args, 0)?;
            registries.rwlocks.with(id, |rw| rw.wlock()).ok_or_else(|| invalid("rwlock", id))?;
            Ok(Value::Int(0))
        }
        "RW_UNLOCK" => {
            let id = arg_i64(args, 0)?;
            let result = registries.rwlocks.with(id, |rw| rw.unlock()).ok_or_else(|| invalid("rwlock", id))?;
            match result {
                Ok(()) => Ok(Value::Int(0)),
                Err(()) => Ok(Value::Long(-1)),
            }
        }
        other => Err(SnowError::syscall_error(format!("unhandled sync syscall `{}`", other))),
    }
}

fn invalid(family: &str, id: i64) -> SnowError {
    SnowError::syscall_error(format!("invalid {} id {}", family, id))
}
