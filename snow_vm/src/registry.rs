//! Small-integer resource registries shared by every thread of a running VM
//! (spec §4.9 "Registry contract", §5 "sharing only the process-wide
//! registries"). Each family is a [`Registry<T>`]: a monotonic id counter
//! plus a locked table, so ids are never reused within a process (the spec
//! only requires the FD registry's *size*, not its id sequence, to return to
//! baseline after a close — see the `registry_id_discipline` test in
//! `core.rs`).

use hashbrown::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::JoinHandle;

use crate::value::Value;

pub struct Registry<T> {
    next_id: AtomicI64,
    table: Mutex<HashMap<i64, T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry { next_id: AtomicI64::new(0), table: Mutex::new(HashMap::new()) }
    }
}

impl<T> Registry<T> {
    pub fn with_start(start: i64) -> Self {
        Registry { next_id: AtomicI64::new(start), table: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, value: T) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.table.lock().unwrap().insert(id, value);
        id
    }

    pub fn insert_at(&self, id: i64, value: T) {
        self.table.lock().unwrap().insert(id, value);
    }

    pub fn remove(&self, id: i64) -> Option<T> {
        self.table.lock().unwrap().remove(&id)
    }

    pub fn with<R>(&self, id: i64, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.table.lock().unwrap().get_mut(&id).map(f)
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}

/// A POSIX-like mutex: a held/free flag plus the condvar threads block on
/// while it is held. Kept as a plain flag (not `std::sync::Mutex`, whose
/// guard cannot be stashed across separate `LOCK`/`UNLOCK` syscalls) so
/// `LOCK`/`UNLOCK` can be two independent VM instructions.
#[derive(Default)]
pub struct MutexResource {
    pub locked: Mutex<bool>,
    pub cond: Condvar,
}

impl MutexResource {
    pub fn lock(&self) {
        let mut guard = self.locked.lock().unwrap();
        while *guard {
            guard = self.cond.wait(guard).unwrap();
        }
        *guard = true;
    }

    pub fn try_lock(&self) -> bool {
        let mut guard = self.locked.lock().unwrap();
        if *guard {
            false
        } else {
            *guard = true;
            true
        }
    }

    pub fn unlock(&self) {
        *self.locked.lock().unwrap() = false;
        self.cond.notify_one();
    }

    /// Atomically releases the mutex and blocks on `signal`, reacquiring the
    /// mutex before returning (spec §5's cond-wait atomicity requirement).
    /// Returns `false` on a timeout (`timeout_ms >= 0`), `true` otherwise.
    pub fn wait_on(&self, signal: &Condvar, timeout_ms: i64) -> bool {
        let mut guard = self.locked.lock().unwrap();
        *guard = false;
        self.cond.notify_one();
        let woke = if timeout_ms < 0 {
            guard = signal.wait(guard).unwrap();
            true
        } else {
            let (g, result) = signal.wait_timeout(guard, std::time::Duration::from_millis(timeout_ms as u64)).unwrap();
            guard = g;
            !result.timed_out()
        };
        while *guard {
            guard = self.cond.wait(guard).unwrap();
        }
        *guard = true;
        woke
    }
}

/// A counting semaphore built the same way: a count plus a condvar, since
/// `std::sync::Mutex`'s guard cannot outlive the syscall that acquired it.
#[derive(Default)]
pub struct SemResource {
    pub count: Mutex<i64>,
    pub cond: Condvar,
}

impl SemResource {
    pub fn new(initial: i64) -> Self {
        SemResource { count: Mutex::new(initial), cond: Condvar::new() }
    }

    /// Returns `false` on timeout or interrupt, `true` on a successful wait.
    pub fn wait(&self, timeout_ms: i64) -> bool {
        let mut guard = self.count.lock().unwrap();
        while *guard <= 0 {
            if timeout_ms == 0 {
                return false;
            }
            if timeout_ms < 0 {
                guard = self.cond.wait(guard).unwrap();
            } else {
                let (g, result) = self.cond.wait_timeout(guard, std::time::Duration::from_millis(timeout_ms as u64)).unwrap();
                guard = g;
                if result.timed_out() {
                    return false;
                }
            }
        }
        *guard -= 1;
        true
    }

    pub fn post(&self) {
        *self.count.lock().unwrap() += 1;
        self.cond.notify_one();
    }
}

/// Readers/writer lock with the spec's documented unlock precedence
/// ("unlock releases write then read; else error").
#[derive(Default)]
pub struct RwLockResource {
    state: Mutex<RwState>,
    cond: Condvar,
}

#[derive(Default, Clone, Copy)]
struct RwState {
    readers: u32,
    writer: bool,
}

impl RwLockResource {
    pub fn rlock(&self) {
        let mut s = self.state.lock().unwrap();
        while s.writer {
            s = self.cond.wait(s).unwrap();
        }
        s.readers += 1;
    }

    pub fn wlock(&self) {
        let mut s = self.state.lock().unwrap();
        while s.writer || s.readers > 0 {
            s = self.cond.wait(s).unwrap();
        }
        s.writer = true;
    }

    /// `Ok(())` on success, `Err(())` when neither a writer nor a reader
    /// held the lock (the documented error case).
    pub fn unlock(&self) -> Result<(), ()> {
        let mut s = self.state.lock().unwrap();
        if s.writer {
            s.writer = false;
        } else if s.readers > 0 {
            s.readers -= 1;
        } else {
            return Err(());
        }
        self.cond.notify_all();
        Ok(())
    }
}

pub enum SocketState {
    Created,
    Bound,
    Listening,
    Connected,
}

pub enum SocketKind {
    Stream,
    Datagram,
}

pub struct SocketResource {
    pub socket: socket2::Socket,
    pub kind: SocketKind,
    pub state: SocketState,
}

pub enum FdResource {
    Stdin,
    Stdout,
    Stderr,
    File(File),
    Socket(SocketResource),
}

/// Every table a running VM's threads share. Owned once per VM instance and
/// handed to each OS thread as an `Arc` (spec §5: "sharing only the
/// process-wide registries").
pub struct Registries {
    pub fds: Registry<FdResource>,
    pub cwd: Mutex<PathBuf>,
    pub mutexes: Registry<MutexResource>,
    pub conds: Registry<Condvar>,
    pub sems: Registry<SemResource>,
    pub rwlocks: Registry<RwLockResource>,
    pub threads: Registry<JoinHandle<Value>>,
    /// `EPOLL_CREATE`'s instances: each id maps to the list of fds it
    /// currently watches (`EPOLL_CTL` adds/removes; `EPOLL_WAIT` polls them).
    pub epolls: Registry<Vec<i64>>,
}

impl Default for Registries {
    fn default() -> Self {
        let fds = Registry::with_start(3);
        fds.insert_at(0, FdResource::Stdin);
        fds.insert_at(1, FdResource::Stdout);
        fds.insert_at(2, FdResource::Stderr);
        Registries {
            fds,
            cwd: Mutex::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
            mutexes: Registry::default(),
            conds: Registry::default(),
            sems: Registry::default(),
            rwlocks: Registry::default(),
            threads: Registry::default(),
            epolls: Registry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_id_discipline_close_after_open_restores_size() {
        let fds: Registry<i32> = Registry::with_start(3);
        let before = fds.len();
        let id = fds.insert(42);
        assert_eq!(fds.len(), before + 1);
        fds.remove(id);
        assert_eq!(fds.len(), before);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let m = MutexResource::default();
        assert!(m.try_lock());
        assert!(!m.try_lock());
        m.unlock();
        assert!(m.try_lock());
    }

    #[test]
    fn rwlock_unlock_without_any_hold_errors() {
        let rw = RwLockResource::default();
        assert!(rw.unlock().is_err());
    }
}
