//! Time family (spec §4.9): no registry — these are pure queries/sleeps
//! against the host clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use snow_common::{SnowError, SnowResult};

use super::arg_i64;
use crate::value::Value;

const CLOCK_REALTIME: i64 = 0;
const CLOCK_MONOTONIC: i64 = 1;

pub fn dispatch(name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "CLOCK_GETTIME" => {
            let clock_id = arg_i64(args, 0)?;
            let nanos = match clock_id {
                CLOCK_REALTIME => SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64,
                CLOCK_MONOTONIC => {
                    use std::sync::OnceLock;
                    static START: OnceLock<std::time::Instant> = OnceLock::new();
                    let start = START.get_or_init(std::time::Instant::now);
                    start.elapsed().as_nanos() as i64
                }
                other => return Err(SnowError::syscall_error(format!("unknown clock id {}", other))),
            };
            Ok(Value::Long(nanos))
        }
        "NANOSLEEP" => {
            let nanos = arg_i64(args, 0)?;
            std::thread::sleep(Duration::from_nanos(nanos.max(0) as u64));
            Ok(Value::Int(0))
        }
        "TIMEOFDAY" => {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            let fields = vec![Value::Long(now.as_secs() as i64), Value::Long(now.subsec_micros() as i64)];
            Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(fields))))
        }
        "TICK_MS" => {
            use std::sync::OnceLock;
            static START: OnceLock<std::time::Instant> = OnceLock::new();
            let start = START.get_or_init(std::time::Instant::now);
            Ok(Value::Long(start.elapsed().as_millis() as i64))
        }
        other => Err(SnowError::syscall_error(format!("unhandled time syscall `{}`", other))),
    }
}
