//! Network family (spec §4.9, §5.9 socket state machine): TCP stream and UDP
//! datagram sockets, built on `socket2` so `SETSOCKOPT` can reach the small
//! allowed option set the spec names without dropping to raw `libc` calls.
//!
//! State machine enforcement (spec §3's "Invalid transitions produce an
//! error integer return (-1)..."): `BIND`/`LISTEN`/`CONNECT`/`ACCEPT` each
//! check the socket's current [`SocketState`] and return `-1` rather than
//! panicking on a misuse a Snow program made.

use std::io::{Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};

use snow_common::{SnowError, SnowResult};
use socket2::{Domain, SockAddr, Socket, Type};

use super::{arg_bytes, arg_i64, arg_str, bytes_to_value};
use crate::registry::{FdResource, Registries, SocketKind, SocketResource, SocketState};
use crate::value::Value;

fn with_socket<R>(registries: &Registries, fd: i64, f: impl FnOnce(&mut SocketResource) -> SnowResult<R>) -> SnowResult<R> {
    registries
        .fds
        .with(fd, |res| match res {
            FdResource::Socket(s) => f(s),
            _ => Err(SnowError::syscall_error(format!("fd {} is not a socket", fd))),
        })
        .ok_or_else(|| SnowError::syscall_error(format!("invalid fd {}", fd)))?
}

fn addr_to_value(addr: SocketAddr) -> Value {
    let fields = vec![Value::Str(Arc::new(addr.ip().to_string())), Value::Int(addr.port() as i32)];
    Value::List(Arc::new(Mutex::new(fields)))
}

pub fn dispatch(registries: &Registries, name: &str, args: &[Value]) -> SnowResult<Value> {
    match name {
        "SOCKET" => {
            let family = arg_i64(args, 0)?; // 2 = AF_INET (only family supported)
            let ty = arg_i64(args, 1)?; // 1 = SOCK_STREAM, 2 = SOCK_DGRAM
            if family != 2 {
                return Err(SnowError::syscall_error("only AF_INET is supported"));
            }
            let (kind, socket_ty) = match ty {
                1 => (SocketKind::Stream, Type::STREAM),
                2 => (SocketKind::Datagram, Type::DGRAM),
                _ => return Err(SnowError::syscall_error(format!("unsupported socket type {}", ty))),
            };
            let socket = Socket::new(Domain::IPV4, socket_ty, None)?;
            let resource = SocketResource { socket, kind, state: SocketState::Created };
            Ok(Value::Long(registries.fds.insert(FdResource::Socket(resource))))
        }
        "BIND" => {
            let fd = arg_i64(args, 0)?;
            let host = arg_str(args, 1)?;
            let port = arg_i64(args, 2)? as u16;
            let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|_| SnowError::syscall_error("bad bind address"))?;
            with_socket(registries, fd, |s| match s.state {
                SocketState::Created => {
                    s.socket.bind(&SockAddr::from(addr))?;
                    s.state = SocketState::Bound;
                    Ok(Value::Int(0))
                }
                _ => Ok(Value::Long(-1)),
            })
        }
        "LISTEN" => {
            let fd = arg_i64(args, 0)?;
            let backlog = arg_i64(args, 1)? as i32;
            with_socket(registries, fd, |s| match s.state {
                SocketState::Bound => {
                    s.socket.listen(backlog)?;
                    s.state = SocketState::Listening;
                    Ok(Value::Int(0))
                }
                _ => Ok(Value::Long(-1)),
            })
        }
        "ACCEPT" => {
            let fd = arg_i64(args, 0)?;
            let (conn, addr) = with_socket(registries, fd, |s| match s.state {
                SocketState::Listening => Ok(s.socket.accept()?),
                _ => Err(SnowError::syscall_error("ACCEPT on a socket that is not listening")),
            })?;
            let peer: SocketAddr = addr.as_socket().ok_or_else(|| SnowError::syscall_error("accepted a non-IP peer"))?;
            let resource = SocketResource { socket: conn, kind: SocketKind::Stream, state: SocketState::Connected };
            let new_fd = registries.fds.insert(FdResource::Socket(resource));
            let fields = vec![Value::Long(new_fd), Value::Str(Arc::new(peer.ip().to_string())), Value::Int(peer.port() as i32)];
            Ok(Value::List(Arc::new(Mutex::new(fields))))
        }
        "CONNECT" => {
            let fd = arg_i64(args, 0)?;
            let host = arg_str(args, 1)?;
            let port = arg_i64(args, 2)? as u16;
            let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|_| SnowError::syscall_error("bad connect address"))?;
            with_socket(registries, fd, |s| {
                s.socket.connect(&SockAddr::from(addr))?;
                s.state = SocketState::Connected;
                Ok(Value::Int(0))
            })
        }
        "SEND" => {
            let fd = arg_i64(args, 0)?;
            let bytes = arg_bytes(args, 1)?;
            let n = with_socket(registries, fd, |s| Ok((&s.socket).write(&bytes)?))?;
            Ok(Value::Long(n as i64))
        }
        "RECV" => {
            let fd = arg_i64(args, 0)?;
            let n = arg_i64(args, 1)? as usize;
            let mut buf = vec![0u8; n];
            let read = with_socket(registries, fd, |s| Ok((&s.socket).read(&mut buf)?))?;
            buf.truncate(read);
            Ok(bytes_to_value(&buf))
        }
        "SENDTO" => {
            let fd = arg_i64(args, 0)?;
            let bytes = arg_bytes(args, 1)?;
            let host = arg_str(args, 2)?;
            let port = arg_i64(args, 3)? as u16;
            let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|_| SnowError::syscall_error("bad sendto address"))?;
            let n = with_socket(registries, fd, |s| Ok(s.socket.send_to(&bytes, &SockAddr::from(addr))?))?;
            Ok(Value::Long(n as i64))
        }
        "RECVFROM" => {
            let fd = arg_i64(args, 0)?;
            let n = arg_i64(args, 1)? as usize;
            let mut buf: Vec<std::mem::MaybeUninit<u8>> = vec![std::mem::MaybeUninit::uninit(); n];
            let (read, from) = with_socket(registries, fd, |s| Ok(s.socket.recv_from(&mut buf)?))?;
            let bytes: Vec<u8> = buf[..read].iter().map(|b| unsafe { b.assume_init() }).collect();
            let peer: SocketAddr = from.as_socket().unwrap_or_else(|| "0.0.0.0:0".parse().unwrap());
            let fields = vec![bytes_to_value(&bytes), Value::Str(Arc::new(peer.ip().to_string())), Value::Int(peer.port() as i32)];
            Ok(Value::List(Arc::new(Mutex::new(fields))))
        }
        "SHUTDOWN" => {
            let fd = arg_i64(args, 0)?;
            let how = arg_i64(args, 1)?;
            let which = match how {
                0 => socket2::Shutdown::Read,
                1 => socket2::Shutdown::Write,
                _ => socket2::Shutdown::Both,
            };
            with_socket(registries, fd, |s| Ok(s.socket.shutdown(which)?))?;
            Ok(Value::Int(0))
        }
        "SETSOCKOPT" => {
            let fd = arg_i64(args, 0)?;
            let opt = arg_str(args, 1)?;
            let value = arg_i64(args, 2)?;
            with_socket(registries, fd, |s| {
                match opt.as_str() {
                    "SO_REUSEADDR" => s.socket.set_reuse_address(value != 0)?,
                    "SO_KEEPALIVE" => s.socket.set_keepalive(value != 0)?,
                    "SO_RCVBUF" => s.socket.set_recv_buffer_size(value as usize)?,
                    "SO_SNDBUF" => s.socket.set_send_buffer_size(value as usize)?,
                    "TCP_NODELAY" => s.socket.set_nodelay(value != 0)?,
                    "SO_BROADCAST" => s.socket.set_broadcast(value != 0)?,
                    other => return Err(SnowError::syscall_error(format!("unsupported socket option `{}`", other))),
                }
                Ok(Value::Int(0))
            })
        }
        "GETSOCKOPT" => {
            let fd = arg_i64(args, 0)?;
            let opt = arg_str(args, 1)?;
            with_socket(registries, fd, |s| {
                let v = match opt.as_str() {
                    "SO_REUSEADDR" => s.socket.reuse_address()? as i64,
                    "SO_KEEPALIVE" => s.socket.keepalive()? as i64,
                    "SO_RCVBUF" => s.socket.recv_buffer_size()? as i64,
                    "SO_SNDBUF" => s.socket.send_buffer_size()? as i64,
                    "TCP_NODELAY" => s.socket.nodelay()? as i64,
                    "SO_BROADCAST" => s.socket.broadcast()? as i64,
                    other => return Err(SnowError::syscall_error(format!("unsupported socket option `{}`", other))),
                };
                Ok(Value::Long(v))
            })
        }
        "GETPEERNAME" => {
            let fd = arg_i64(args, 0)?;
            with_socket(registries, fd, |s| {
                let addr = s.socket.peer_addr()?.as_socket().ok_or_else(|| SnowError::syscall_error("non-IP peer"))?;
                Ok(addr_to_value(addr))
            })
        }
        "GETSOCKNAME" => {
            let fd = arg_i64(args, 0)?;
            with_socket(registries, fd, |s| {
                let addr = s.socket.local_addr()?.as_socket().ok_or_else(|| SnowError::syscall_error("non-IP local address"))?;
                Ok(addr_to_value(addr))
            })
        }
        "GETADDRINFO" => {
            let host = arg_str(args, 0)?;
            let port = arg_i64(args, 1)? as u16;
            let addrs: Vec<Value> = (host.as_str(), port).to_socket_addrs()?.map(addr_to_value).collect();
            Ok(Value::List(Arc::new(Mutex::new(addrs))))
        }
        other => Err(SnowError::syscall_error(format!("unhandled network syscall `{}`", other))),
    }
}
