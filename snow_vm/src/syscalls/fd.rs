//! FD/File family (spec §4.9): open file descriptors live in
//! `Registries::fds`, keyed by the same small integers the reserved ids 0/1/2
//! (stdin/stdout/stderr) occupy. Most handlers here surface a host I/O
//! failure as a [`SnowError`] (the "unclassified-io" taxonomy entry, spec
//! §7.3); `CLOSE`/`SEEK` on an unknown fd use the in-band `-1` convention
//! since a missing fd is routine enough (a program racing a `CLOSE`) not to
//! warrant unwinding the thread.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};

use snow_common::{SnowError, SnowResult};

use super::{arg_bytes, arg_i64, arg_str, bytes_to_value};
use crate::registry::{FdResource, Registries};
use crate::value::Value;

fn with_file<R>(registries: &Registries, fd: i64, f: impl FnOnce(&mut File) -> SnowResult<R>) -> SnowResult<R> {
    registries
        .fds
        .with(fd, |res| match res {
            FdResource::File(file) => f(file),
            _ => Err(SnowError::syscall_error(format!("fd {} is not a regular file", fd))),
        })
        .ok_or_else(|| SnowError::syscall_error(format!("invalid fd {}", fd)))?
}

/// Translates the Snow source's flag bitmask into `OpenOptions`: bit 0 = read,
/// bit 1 = write, bit 2 = append, bit 3 = create, bit 4 = truncate — the same
/// ordering POSIX's `O_RDONLY/O_WRONLY/O_APPEND/O_CREAT/O_TRUNC` group
/// exposes, flattened to a single integer since Snow has no bitwise-OR of
/// named constants at the syscall boundary.
fn open_options(flags: i64) -> OpenOptions {
    let mut opts = OpenOptions::new();
    let read = flags & 0x1 != 0;
    let write = flags & 0x2 != 0;
    opts.read(read || !write);
    opts.write(write);
    opts.append(flags & 0x4 != 0);
    opts.create(flags & 0x8 != 0);
    opts.truncate(flags & 0x10 != 0);
    opts
}

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "OPEN" => {
            let path = arg_str(args, 0)?;
            let flags = arg_i64(args, 1)?;
            let file = open_options(flags).open(&path)?;
            Ok(Value::Long(registries.fds.insert(FdResource::File(file))))
        }
        "READ" => {
            let fd = arg_i64(args, 0)?;
            let n = arg_i64(args, 1)? as usize;
            let mut buf = vec![0u8; n];
            let read = with_file(registries, fd, |f| Ok(f.read(&mut buf)?))?;
            buf.truncate(read);
            Ok(bytes_to_value(&buf))
        }
        "WRITE" => {
            let fd = arg_i64(args, 0)?;
            let bytes = arg_bytes(args, 1)?;
            let written = with_file(registries, fd, |f| Ok(f.write(&bytes)?))?;
            Ok(Value::Long(written as i64))
        }
        "SEEK" => {
            let fd = arg_i64(args, 0)?;
            let off = arg_i64(args, 1)?;
            let whence = arg_i64(args, 2)?;
            let pos = match whence {
                0 => SeekFrom::Start(off as u64),
                1 => SeekFrom::Current(off),
                2 => SeekFrom::End(off),
                _ => return Err(SnowError::syscall_error(format!("bad SEEK whence {}", whence))),
            };
            match with_file(registries, fd, |f| Ok(f.seek(pos)?)) {
                Ok(p) => Ok(Value::Long(p as i64)),
                Err(_) => Ok(Value::Long(-1)),
            }
        }
        "CLOSE" => {
            if registries.fds.remove(arg_i64(args, 0)?).is_some() {
                Ok(Value::Int(0))
            } else {
                Ok(Value::Long(-1))
            }
        }
        "STAT" => {
            let path = arg_str(args, 0)?;
            let meta = std::fs::metadata(&path)?;
            let fields = vec![
                Value::Long(meta.len() as i64),
                Value::Bool(meta.is_dir()),
                Value::Long(meta.mode() as i64),
                Value::Long(meta.mtime()),
            ];
            Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(fields))))
        }
        "DUP" => {
            let fd = arg_i64(args, 0)?;
            let cloned = with_file(registries, fd, |f| Ok(f.try_clone()?))?;
            Ok(Value::Long(registries.fds.insert(FdResource::File(cloned))))
        }
        "DUP2" => {
            let fd = arg_i64(args, 0)?;
            let new_fd = arg_i64(args, 1)?;
            let cloned = with_file(registries, fd, |f| Ok(f.try_clone()?))?;
            registries.fds.insert_at(new_fd, FdResource::File(cloned));
            Ok(Value::Long(new_fd))
        }
        "PIPE" => Err(SnowError::syscall_error("PIPE is not supported: no anonymous-pipe primitive on this host")),
        "TRUNCATE" => {
            let path = arg_str(args, 0)?;
            let len = arg_i64(args, 1)? as u64;
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(len)?;
            Ok(Value::Int(0))
        }
        "FTRUNCATE" => {
            let fd = arg_i64(args, 0)?;
            let len = arg_i64(args, 1)? as u64;
            with_file(registries, fd, |f| Ok(f.set_len(len)?))?;
            Ok(Value::Int(0))
        }
        "RENAME" => {
            std::fs::rename(arg_str(args, 0)?, arg_str(args, 1)?)?;
            Ok(Value::Int(0))
        }
        "LINK" => {
            std::fs::hard_link(arg_str(args, 0)?, arg_str(args, 1)?)?;
            Ok(Value::Int(0))
        }
        "SYMLINK" => {
            symlink(arg_str(args, 0)?, arg_str(args, 1)?)?;
            Ok(Value::Int(0))
        }
        "READLINK" => Ok(Value::Str(std::sync::Arc::new(
            std::fs::read_link(arg_str(args, 0)?)?.to_string_lossy().into_owned(),
        ))),
        "SET_NONBLOCK" => {
            // Plain files have no O_NONBLOCK concept on POSIX; accepted as a
            // no-op so socket fds (handled via `net::dispatch`) are the only
            // ones that matter.
            let _ = arg_i64(args, 0)?;
            Ok(Value::Int(0))
        }
        other => Err(SnowError::syscall_error(format!("unhandled FD syscall `{}`", other))),
    }
}

/// Used by `console::dispatch` and `net::dispatch` to toggle file
/// permissions without duplicating the `PermissionsExt` import.
pub(crate) fn set_mode(path: &str, mode: u32) -> SnowResult<()> {
    let perms = std::fs::Permissions::from_mode(mode);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}
