//! Two-pass semantic analysis over a Snow [`snow_ast::Program`] (spec §4.5).
//!
//! This crate owns everything the analyzer and the IR builder need to
//! agree on: the type system ([`types`]), compile-time constant values
//! ([`value`]) and folding ([`fold`]), number-literal classification
//! ([`literal`]), and the cross-module global tables ([`tables`]) that are
//! built once during analysis and then handed, read-only, to the IR
//! builder for a given compilation.

pub mod checker;
pub mod fold;
pub mod literal;
pub mod tables;
pub mod types;
pub mod value;

pub use checker::{block_returns_on_all_paths, ctor_name, method_name, Analyzer};
pub use fold::{fold_expr, fold_expr_checked, IndexOutOfRange};
pub use literal::{apply_default_suffix, classify, LiteralClass};
pub use tables::{FunctionSignature, ProgramTables, StructLayout};
pub use types::{check_compatibility, integer_fits, struct_derives_from, Compatibility, PrimitiveType, StructHierarchy, Type};
pub use value::ConstValue;
