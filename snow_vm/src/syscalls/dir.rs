//! Directory family (spec §4.9): path-based operations that don't go
//! through the fd registry at all, plus the one piece of mutable
//! process-wide state this family owns outright — the working directory
//! (spec §3 "VM runtime state" lists `cwd` alongside the fd table).

use std::os::unix::fs::PermissionsExt;

use snow_common::SnowResult;

use super::{arg_i64, arg_str};
use crate::registry::Registries;
use crate::value::Value;

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "MKDIR" => {
            std::fs::create_dir_all(arg_str(args, 0)?)?;
            Ok(Value::Int(0))
        }
        "RMDIR" => {
            std::fs::remove_dir(arg_str(args, 0)?)?;
            Ok(Value::Int(0))
        }
        "CHDIR" => {
            let path = arg_str(args, 0)?;
            *registries.cwd.lock().unwrap() = std::path::PathBuf::from(&path);
            std::env::set_current_dir(&path)?;
            Ok(Value::Int(0))
        }
        "GETCWD" => Ok(Value::Str(std::sync::Arc::new(registries.cwd.lock().unwrap().to_string_lossy().into_owned()))),
        "READDIR" => {
            let path = arg_str(args, 0)?;
            let names: Vec<Value> = std::fs::read_dir(&path)?
                .filter_map(|e| e.ok())
                .map(|e| Value::Str(std::sync::Arc::new(e.file_name().to_string_lossy().into_owned())))
                .collect();
            Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(names))))
        }
        "CHMOD" => {
            let path = arg_str(args, 0)?;
            let mode = arg_i64(args, 1)? as u32;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
            Ok(Value::Int(0))
        }
        "FCHMOD" => super::fd::set_mode(&arg_str(args, 0)?, arg_i64(args, 1)? as u32).map(|_| Value::Int(0)),
        "UTIME" => {
            // `std` has no portable utimensat; accepted as a documented
            // no-op rather than a host-level failure so scripts that stamp
            // mtimes for cosmetic reasons don't abort a whole program.
            let _ = (arg_str(args, 0)?, arg_i64(args, 1)?);
            Ok(Value::Int(0))
        }
        other => Err(snow_common::SnowError::syscall_error(format!("unhandled directory syscall `{}`", other))),
    }
}
