//! The syscall dispatch table (spec §4.9): one handler per family, routed
//! by the subcommand name `SYSCALL` popped off the operand stack (spec
//! §4.8 frames the id as numeric; this VM spells it as the quoted op name
//! Snow source passes as `syscall`'s first argument — see
//! `snow_ir::builder::expr::build_call`'s `syscall(...)` lowering and the
//! Open Question note in `DESIGN.md`).
//!
//! Each handler documents, per spec §7.3, which error convention it uses:
//! an in-band numeric failure (`-1`/`0`) or a host-level [`SnowError`].

mod array;
mod console;
mod dir;
mod fd;
mod multiplex;
mod net;
mod process;
mod sync;
mod sysinfo;
mod time;

use snow_common::{SnowError, SnowResult};

use crate::core::{Interp, VmShared};
use crate::value::Value;

pub(crate) fn arg(args: &[Value], i: usize) -> SnowResult<&Value> {
    args.get(i).ok_or_else(|| SnowError::syscall_error(format!("missing argument {}", i)))
}

pub(crate) fn arg_i64(args: &[Value], i: usize) -> SnowResult<i64> {
    arg(args, i)?.as_i64().ok_or_else(|| SnowError::syscall_error(format!("argument {} must be numeric", i)))
}

pub(crate) fn arg_str(args: &[Value], i: usize) -> SnowResult<String> {
    arg(args, i)?.as_str().map(str::to_string).ok_or_else(|| SnowError::syscall_error(format!("argument {} must be a string", i)))
}

/// Byte payloads (spec §4.9 FD/Network families) travel as a
/// `Value::List` of `Value::Int`s — the same "numbers pushed as integers"
/// convention the Array family uses — so `READ`/`RECV` and `WRITE`/`SEND`
/// agree on one wire shape regardless of whether the bytes are textual.
pub(crate) fn arg_bytes(args: &[Value], i: usize) -> SnowResult<Vec<u8>> {
    match arg(args, i)? {
        Value::Str(s) => Ok(s.as_bytes().to_vec()),
        Value::List(l) => l
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().map(|n| n as u8).ok_or_else(|| SnowError::syscall_error("byte list element must be numeric")))
            .collect(),
        _ => Err(SnowError::syscall_error(format!("argument {} must be a string or byte array", i))),
    }
}

pub(crate) fn bytes_to_value(bytes: &[u8]) -> Value {
    let items = bytes.iter().map(|b| Value::Int(*b as i32)).collect();
    Value::List(std::sync::Arc::new(std::sync::Mutex::new(items)))
}

pub fn dispatch(shared: &VmShared, interp: &mut Interp, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        // FD/File
        "OPEN" | "READ" | "WRITE" | "SEEK" | "CLOSE" | "STAT" | "DUP" | "DUP2" | "PIPE" | "TRUNCATE" | "FTRUNCATE" | "RENAME" | "LINK" | "SYMLINK"
        | "READLINK" | "SET_NONBLOCK" => fd::dispatch(&shared.registries, name, args),
        // Directory
        "MKDIR" | "RMDIR" | "CHDIR" | "GETCWD" | "READDIR" | "CHMOD" | "FCHMOD" | "UTIME" => dir::dispatch(&shared.registries, name, args),
        // Console
        "STDIN_READ" | "STDOUT_WRITE" | "STDERR_WRITE" => console::dispatch(&shared.registries, name, args),
        // Multiplex
        "SELECT" | "EPOLL_CREATE" | "EPOLL_CTL" | "EPOLL_WAIT" | "IO_WAIT" => multiplex::dispatch(&shared.registries, name, args),
        // Network
        "SOCKET" | "BIND" | "LISTEN" | "ACCEPT" | "CONNECT" | "SEND" | "RECV" | "SENDTO" | "RECVFROM" | "SHUTDOWN" | "SETSOCKOPT" | "GETSOCKOPT"
        | "GETPEERNAME" | "GETSOCKNAME" | "GETADDRINFO" => net::dispatch(&shared.registries, name, args),
        // Process/Thread. The spec's table shorthand lists a bare "WAIT" for
        // both process-wait and cond-wait; disambiguated here as
        // `PROC_WAIT`/`COND_WAIT` since a dispatch-by-name table can't carry
        // the same key twice (see DESIGN.md).
        "EXIT" | "FORK" | "EXEC" | "PROC_WAIT" | "GETPID" | "GETPPID" | "THREAD_CREATE" | "THREAD_JOIN" | "SLEEP" => {
            process::dispatch(shared, interp, name, args)
        }
        // Array
        "ARR_LEN" | "ARR_GET" | "ARR_SET" | "ARR_REMOVE" => array::dispatch(name, args),
        // System info
        "GETENV" | "SETENV" | "NCPU" | "RANDOM_BYTES" | "ERRNO" | "ERRSTR" | "MEMINFO" => sysinfo::dispatch(name, args),
        // Sync
        "MUTEX_NEW" | "LOCK" | "TRYLOCK" | "UNLOCK" | "COND_NEW" | "COND_WAIT" | "SIGNAL" | "BROADCAST" | "SEM_NEW" | "SEM_WAIT" | "POST"
        | "RWLOCK_NEW" | "RLOCK" | "WLOCK" | "RW_UNLOCK" => sync::dispatch(&shared.registries, name, args),
        // Time
        "CLOCK_GETTIME" | "NANOSLEEP" | "TIMEOFDAY" | "TICK_MS" => time::dispatch(name, args),
        other => Err(SnowError::syscall_error(format!("unknown syscall `{}`", other))),
    }
}
