//! Console family (spec §4.9): `STDIN_READ`/`STDOUT_WRITE`/`STDERR_WRITE`
//! are bound to the reserved fds 0/1/2 rather than going through the
//! general fd registry's `File` variant, since the process's standard
//! streams aren't `std::fs::File`s.

use std::io::{Read, Write};

use snow_common::{SnowError, SnowResult};

use super::{arg_bytes, arg_i64, bytes_to_value};
use crate::registry::{FdResource, Registries};
use crate::value::Value;

fn expect_fd(registries: &Registries, fd: i64, expected: fn(&FdResource) -> bool, label: &str) -> SnowResult<()> {
    registries
        .fds
        .with(fd, |res| expected(res))
        .filter(|ok| *ok)
        .map(|_| ())
        .ok_or_else(|| SnowError::syscall_error(format!("fd {} is not {}", fd, label)))
}

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "STDIN_READ" => {
            let fd = arg_i64(args, 0)?;
            expect_fd(registries, fd, |r| matches!(r, FdResource::Stdin), "stdin")?;
            let n = arg_i64(args, 1)? as usize;
            let mut buf = vec![0u8; n];
            let read = std::io::stdin().read(&mut buf)?;
            buf.truncate(read);
            Ok(bytes_to_value(&buf))
        }
        "STDOUT_WRITE" => {
            let fd = arg_i64(args, 0)?;
            expect_fd(registries, fd, |r| matches!(r, FdResource::Stdout), "stdout")?;
            let bytes = arg_bytes(args, 1)?;
            let written = std::io::stdout().write(&bytes)?;
            std::io::stdout().flush()?;
            Ok(Value::Long(written as i64))
        }
        "STDERR_WRITE" => {
            let fd = arg_i64(args, 0)?;
            expect_fd(registries, fd, |r| matches!(r, FdResource::Stderr), "stderr")?;
            let bytes = arg_bytes(args, 1)?;
            let written = std::io::stderr().write(&bytes)?;
            std::io::stderr().flush()?;
            Ok(Value::Long(written as i64))
        }
        other => Err(SnowError::syscall_error(format!("unhandled console syscall `{}`", other))),
    }
}
