//! Compile-time constant values.
//!
//! Shared by the semantic analyzer (constant-range validation, global
//! constant table) and the IR builder (constant folding, `LOAD_CONST`
//! operands) — spec §3 "Constant".

use crate::types::{PrimitiveType, Type};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Stored as 0/1 at the VM boundary, but kept as `bool` up here for
    /// ergonomic folding.
    Bool(bool),
    Str(String),
    List(Vec<ConstValue>),
    Null,
}

impl ConstValue {
    pub fn type_of(&self) -> Type {
        match self {
            ConstValue::Byte(_) => Type::Primitive(PrimitiveType::Byte),
            ConstValue::Short(_) => Type::Primitive(PrimitiveType::Short),
            ConstValue::Int(_) => Type::Primitive(PrimitiveType::Int),
            ConstValue::Long(_) => Type::Primitive(PrimitiveType::Long),
            ConstValue::Float(_) => Type::Primitive(PrimitiveType::Float),
            ConstValue::Double(_) => Type::Primitive(PrimitiveType::Double),
            ConstValue::Bool(_) => Type::Primitive(PrimitiveType::Bool),
            ConstValue::Str(_) => Type::Primitive(PrimitiveType::Str),
            ConstValue::Null => Type::Any,
            ConstValue::List(items) => {
                let elem = items.first().map(|v| v.type_of()).unwrap_or(Type::Any);
                Type::Array(Box::new(elem))
            }
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstValue::Byte(v) => Some(*v as i64),
            ConstValue::Short(v) => Some(*v as i64),
            ConstValue::Int(v) => Some(*v as i64),
            ConstValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Float(v) => Some(*v as f64),
            ConstValue::Double(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ConstValue::Str(_))
    }

    /// Stringifies any constant for use on the implicit-string-concat path
    /// (spec §4.2, `+` string concatenation).
    pub fn display(&self) -> String {
        match self {
            ConstValue::Byte(v) => v.to_string(),
            ConstValue::Short(v) => v.to_string(),
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Long(v) => v.to_string(),
            ConstValue::Float(v) => v.to_string(),
            ConstValue::Double(v) => v.to_string(),
            ConstValue::Bool(v) => v.to_string(),
            ConstValue::Str(v) => v.clone(),
            ConstValue::Null => "null".to_string(),
            ConstValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.display()).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}
