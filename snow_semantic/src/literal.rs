//! Number-literal classification (spec §4.2 "Number literal", §4.5).
//!
//! Shared by the semantic analyzer (range validation) and the IR builder
//! (load-const emission + destination register tagging) so the two always
//! agree on how a literal's text maps to a type and a value.

use crate::types::{PrimitiveType, Type};
use crate::value::ConstValue;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralClass {
    /// An integer literal with no suffix: defaults to `int`, but a
    /// caller-supplied "default numeric suffix" (spec §4.4, the return-type
    /// coercion hint) may widen it to `long`.
    Int(i64),
    /// Explicit `l`/`L` suffix.
    Long(i64),
    /// Explicit `f`/`F` suffix, or coerced from a default suffix of float.
    Float(f64),
    /// `.`/`e`/`E` present with no suffix, or explicit coercion to double.
    Double(f64),
}

/// Classify a literal's source text per spec §4.2: suffix `l`→long,
/// `f`→float; otherwise a decimal point or exponent marker means double;
/// otherwise it is a plain (unsuffixed) int.
pub fn classify(text: &str) -> LiteralClass {
    let lower = text.to_ascii_lowercase();
    if let Some(digits) = lower.strip_suffix('l') {
        let value: i64 = digits.parse().unwrap_or(0);
        return LiteralClass::Long(value);
    }
    if let Some(digits) = lower.strip_suffix('f') {
        let value: f64 = digits.parse().unwrap_or(0.0);
        return LiteralClass::Float(value);
    }
    if lower.contains('.') || lower.contains('e') {
        let value: f64 = lower.parse().unwrap_or(0.0);
        return LiteralClass::Double(value);
    }
    let value: i64 = text.parse().unwrap_or(0);
    LiteralClass::Int(value)
}

/// Apply a function-scoped "default numeric suffix" (spec §4.4) to an
/// otherwise-unsuffixed int literal, used when the enclosing function's
/// return type forces a wider representation.
pub fn apply_default_suffix(class: LiteralClass, default_suffix: Option<PrimitiveType>) -> LiteralClass {
    match (class, default_suffix) {
        (LiteralClass::Int(v), Some(PrimitiveType::Long)) => LiteralClass::Long(v),
        (LiteralClass::Int(v), Some(PrimitiveType::Float)) => LiteralClass::Float(v as f64),
        (LiteralClass::Int(v), Some(PrimitiveType::Double)) => LiteralClass::Double(v as f64),
        (class, _) => class,
    }
}

impl LiteralClass {
    pub fn inferred_type(&self) -> Type {
        match self {
            LiteralClass::Int(_) => Type::Primitive(PrimitiveType::Int),
            LiteralClass::Long(_) => Type::Primitive(PrimitiveType::Long),
            LiteralClass::Float(_) => Type::Primitive(PrimitiveType::Float),
            LiteralClass::Double(_) => Type::Primitive(PrimitiveType::Double),
        }
    }

    pub fn to_const_value(&self) -> ConstValue {
        match self {
            LiteralClass::Int(v) => ConstValue::Int(*v as i32),
            LiteralClass::Long(v) => ConstValue::Long(*v),
            LiteralClass::Float(v) => ConstValue::Float(*v as f32),
            LiteralClass::Double(v) => ConstValue::Double(*v),
        }
    }

    /// Human-readable range-validation diagnostic, with the smart
    /// suggestions called out in spec §4.5 ("exceeds int range; append L or
    /// declare long"). Returns `None` when the literal is representable.
    pub fn range_error(&self) -> Option<String> {
        match self {
            LiteralClass::Int(v) => {
                if *v < i32::MIN as i64 || *v > i32::MAX as i64 {
                    Some(format!("integer literal {} exceeds int range; append L or declare long", v))
                } else {
                    None
                }
            }
            LiteralClass::Long(_) => None,
            LiteralClass::Float(v) => {
                if v.is_finite() && (*v as f32) as f64 != *v && v.abs() > f32::MAX as f64 {
                    Some(format!("float literal {} exceeds float range; declare double", v))
                } else {
                    None
                }
            }
            LiteralClass::Double(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_long_suffix() {
        assert_eq!(classify("42L"), LiteralClass::Long(42));
        assert_eq!(classify("42l"), LiteralClass::Long(42));
    }

    #[test]
    fn classifies_float_suffix() {
        assert_eq!(classify("3.5f"), LiteralClass::Float(3.5));
    }

    #[test]
    fn classifies_double_by_decimal_point() {
        assert_eq!(classify("3.5"), LiteralClass::Double(3.5));
        assert_eq!(classify("1e10"), LiteralClass::Double(1e10));
    }

    #[test]
    fn classifies_plain_int() {
        assert_eq!(classify("42"), LiteralClass::Int(42));
    }

    #[test]
    fn int_overflow_produces_suggestion() {
        let class = classify("99999999999");
        let err = class.range_error().unwrap();
        assert!(err.contains("append L or declare long"));
    }
}
