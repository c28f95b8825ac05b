//! The Snow type system: the closed primitive set, composite types, and the
//! numeric widening chain described in spec §3.

use serde::{Deserialize, Serialize};
use snow_ast::TypeExpr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
    Str,
    Void,
}

impl PrimitiveType {
    /// Position in the widening chain byte → short → int → long → float →
    /// double (spec §3). Bool/Str/Void never widen and have no rank.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            PrimitiveType::Byte => Some(0),
            PrimitiveType::Short => Some(1),
            PrimitiveType::Int => Some(2),
            PrimitiveType::Long => Some(3),
            PrimitiveType::Float => Some(4),
            PrimitiveType::Double => Some(5),
            PrimitiveType::Bool | PrimitiveType::Str | PrimitiveType::Void => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_integral(self) -> bool {
        matches!(self, PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Int | PrimitiveType::Long)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Str => "string",
            PrimitiveType::Void => "void",
        };
        write!(f, "{}", name)
    }
}

/// The main type representation, shared by the semantic analyzer and (via
/// register/constant tags) the IR builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveType),
    /// The universal "any" type — compatible with itself and nothing else
    /// narrows into it implicitly except by identity (spec §3).
    Any,
    Array(Box<Type>),
    /// A named struct type. Field/method resolution goes through the
    /// struct-layout table, not through this variant.
    Struct(String),
    Function { params: Vec<Type>, return_type: Box<Type> },
    /// Error-recovery placeholder: analysis continues after producing one,
    /// but it is compatible with everything so it never cascades spurious
    /// errors (spec §4.5).
    Error,
}

impl Type {
    pub fn int() -> Type {
        Type::Primitive(PrimitiveType::Int)
    }

    pub fn bool() -> Type {
        Type::Primitive(PrimitiveType::Bool)
    }

    pub fn string() -> Type {
        Type::Primitive(PrimitiveType::Str)
    }

    pub fn void() -> Type {
        Type::Primitive(PrimitiveType::Void)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_numeric())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Resolve a parsed type annotation into a `Type`. Named types are
    /// trusted to refer to a registered struct — callers validate that
    /// separately against the struct-layout table.
    pub fn from_type_expr(expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::Byte => Type::Primitive(PrimitiveType::Byte),
            TypeExpr::Short => Type::Primitive(PrimitiveType::Short),
            TypeExpr::Int => Type::Primitive(PrimitiveType::Int),
            TypeExpr::Long => Type::Primitive(PrimitiveType::Long),
            TypeExpr::Float => Type::Primitive(PrimitiveType::Float),
            TypeExpr::Double => Type::Primitive(PrimitiveType::Double),
            TypeExpr::Bool => Type::Primitive(PrimitiveType::Bool),
            TypeExpr::Str => Type::Primitive(PrimitiveType::Str),
            TypeExpr::Void => Type::Primitive(PrimitiveType::Void),
            TypeExpr::Any => Type::Any,
            TypeExpr::Array(elem) => Type::Array(Box::new(Type::from_type_expr(elem))),
            TypeExpr::Named(name) => Type::Struct(name.clone()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Any => write!(f, "any"),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Struct(name) => write!(f, "{}", name),
            Type::Function { params, return_type } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", return_type)
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}

/// Result of asking whether a value of type `from` may be used where `to`
/// is expected (spec §3 compatibility rules, §4.5 narrowing policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Directly compatible, no conversion needed.
    Identity,
    /// Compatible via implicit numeric widening.
    Widen,
    /// Compatible only because the source is a compile-time constant that
    /// fits in the (narrower) target range.
    ConstNarrow,
    /// Compatible because the target accepts an unchecked runtime narrow
    /// (byte/short from a runtime int, spec §4.5/§9 Open Question 2).
    RuntimeNarrow,
    Incompatible,
}

impl Compatibility {
    pub fn is_compatible(self) -> bool {
        !matches!(self, Compatibility::Incompatible)
    }
}

/// Struct inheritance and parent-chain lookups are needed to decide struct
/// subtyping; this trait lets `types.rs` stay free of a hard dependency on
/// any particular table implementation.
pub trait StructHierarchy {
    fn parent_of(&self, struct_name: &str) -> Option<String>;
}

/// Walks `descendant`'s parent chain looking for `ancestor` (inclusive of
/// `descendant == ancestor`).
pub fn struct_derives_from(hierarchy: &dyn StructHierarchy, descendant: &str, ancestor: &str) -> bool {
    if descendant == ancestor {
        return true;
    }
    let mut current = descendant.to_string();
    let mut guard = 0;
    while let Some(parent) = hierarchy.parent_of(&current) {
        if parent == ancestor {
            return true;
        }
        current = parent;
        guard += 1;
        if guard > 10_000 {
            // Cyclic parent chain; treat as non-derivation rather than loop forever.
            return false;
        }
    }
    false
}

/// Check whether `from` is compatible with `to`, per spec §3/§4.5.
///
/// `hierarchy` resolves struct parent links for struct-to-struct widening
/// (an instance of `Sub` is compatible with a `Base` target when `Sub`
/// transitively derives from `Base`).
pub fn check_compatibility(to: &Type, from: &Type, hierarchy: &dyn StructHierarchy) -> Compatibility {
    if to.is_error() || from.is_error() {
        return Compatibility::Identity;
    }
    if to == from {
        return Compatibility::Identity;
    }
    match (to, from) {
        (Type::Any, _) | (_, Type::Any) => Compatibility::Identity,
        (Type::Primitive(t), Type::Primitive(f)) => {
            match (t.numeric_rank(), f.numeric_rank()) {
                (Some(tr), Some(fr)) if fr <= tr => Compatibility::Widen,
                _ => Compatibility::Incompatible,
            }
        }
        (Type::Struct(target_name), Type::Struct(source_name)) => {
            if struct_derives_from(hierarchy, source_name, target_name) {
                Compatibility::Widen
            } else {
                Compatibility::Incompatible
            }
        }
        (Type::Array(t_elem), Type::Array(f_elem)) => {
            check_compatibility(t_elem, f_elem, hierarchy)
        }
        _ => Compatibility::Incompatible,
    }
}

/// Narrowing policy for `byte`/`short` declaration targets (spec §4.5).
/// `value` is the compile-time-constant integer value being assigned, if
/// known; returns whether it fits in `target`'s range.
pub fn integer_fits(target: PrimitiveType, value: i64) -> bool {
    match target {
        PrimitiveType::Byte => (i8::MIN as i64..=i8::MAX as i64).contains(&value),
        PrimitiveType::Short => (i16::MIN as i64..=i16::MAX as i64).contains(&value),
        PrimitiveType::Int => (i32::MIN as i64..=i32::MAX as i64).contains(&value),
        PrimitiveType::Long => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoParents;
    impl StructHierarchy for NoParents {
        fn parent_of(&self, _: &str) -> Option<String> {
            None
        }
    }

    struct LinearHierarchy;
    impl StructHierarchy for LinearHierarchy {
        fn parent_of(&self, name: &str) -> Option<String> {
            match name {
                "Sub" => Some("Base".to_string()),
                "SubSub" => Some("Sub".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn widening_chain_is_monotonic() {
        let h = NoParents;
        assert_eq!(
            check_compatibility(&Type::Primitive(PrimitiveType::Long), &Type::Primitive(PrimitiveType::Int), &h),
            Compatibility::Widen
        );
        assert_eq!(
            check_compatibility(&Type::Primitive(PrimitiveType::Int), &Type::Primitive(PrimitiveType::Long), &h),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn any_is_compatible_both_ways() {
        let h = NoParents;
        assert_eq!(check_compatibility(&Type::Any, &Type::int(), &h), Compatibility::Identity);
        assert_eq!(check_compatibility(&Type::int(), &Type::Any, &h), Compatibility::Identity);
    }

    #[test]
    fn struct_subtyping_walks_parent_chain() {
        let h = LinearHierarchy;
        assert_eq!(
            check_compatibility(&Type::Struct("Base".into()), &Type::Struct("SubSub".into()), &h),
            Compatibility::Widen
        );
        assert_eq!(
            check_compatibility(&Type::Struct("SubSub".into()), &Type::Struct("Base".into()), &h),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn byte_narrowing_boundaries() {
        assert!(integer_fits(PrimitiveType::Byte, 127));
        assert!(!integer_fits(PrimitiveType::Byte, 128));
        assert!(integer_fits(PrimitiveType::Byte, -128));
        assert!(!integer_fits(PrimitiveType::Byte, -129));
    }
}
