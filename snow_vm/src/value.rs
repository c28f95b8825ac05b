//! Runtime values (spec §3 "VM runtime state", §4.8): the operand stack and
//! local-variable store both hold these. Lists and structs share the same
//! list-backed representation (spec §5 "Struct instances (list-backed)"),
//! distinguished only by an optional struct-name tag.
//!
//! Backed by `Arc`/`Mutex` rather than `Rc`/`RefCell`: spec §5 requires
//! `THREAD_CREATE` to spawn a real OS thread, and any `Value` reachable from
//! an argument (or a shared struct/array captured by two threads) has to be
//! `Send`. The spec explicitly does not require structs/arrays to be
//! internally race-free ("not thread-safe by default; user code must
//! protect them") — only that sharing them across threads compiles and
//! doesn't corrupt memory, which a `Mutex` around the backing `Vec`
//! guarantees regardless of whether the Snow program bothers to take a
//! `MUTEX_NEW` lock around its own accesses.

use std::fmt;
use std::sync::{Arc, Mutex};

pub type ListRef = Arc<Mutex<Vec<Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Stored as 0/1 in the textual form but kept tagged at runtime so
    /// syscalls and comparisons can distinguish a bool from a raw integer.
    Bool(bool),
    Str(Arc<String>),
    /// A plain array literal/container.
    List(ListRef),
    /// The same list-backed representation, additionally tagged with its
    /// struct name for `CMP_REQ`/`CMP_RNE` and method dispatch.
    Struct(Arc<str>, ListRef),
    /// A process-registry handle (fd, socket, mutex, thread, …) — small
    /// integer ids are carried as plain `Int`s; this variant exists for
    /// values the syscall table hands back that are not otherwise typed.
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "array",
            Value::Struct(..) => "struct",
            Value::Null => "null",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            Value::Struct(_, l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reference identity for `CMP_REQ`/`CMP_RNE` on struct/array operands;
    /// strings compare by content instead (spec §3's "reference-equality
    /// variant" is framed generically, the VM narrows it per runtime tag).
    pub fn ref_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Struct(an, a), Value::Struct(bn, b)) => an == bn && Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Value::Byte(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Str(s) => s.to_string(),
            Value::List(l) => {
                let items: Vec<String> = l.lock().unwrap().iter().map(|v| v.display()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Struct(name, l) => {
                let items: Vec<String> = l.lock().unwrap().iter().map(|v| v.display()).collect();
                format!("{}({})", name, items.join(", "))
            }
            Value::Null => "null".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_ref_eq_compares_pointer_identity() {
        let backing: ListRef = Arc::new(Mutex::new(vec![Value::Int(1)]));
        let a = Value::Struct(Arc::from("Point"), backing.clone());
        let b = Value::Struct(Arc::from("Point"), backing.clone());
        let c = Value::Struct(Arc::from("Point"), Arc::new(Mutex::new(vec![Value::Int(1)])));
        assert!(a.ref_eq(&b));
        assert!(!a.ref_eq(&c));
    }

    #[test]
    fn string_ref_eq_compares_content() {
        let a = Value::Str(Arc::new("hi".to_string()));
        let b = Value::Str(Arc::new("hi".to_string()));
        assert!(a.ref_eq(&b));
    }
}
