//! Snow CLI library
//!
//! Exposes the `snow` binary's pipeline stages (source discovery, the
//! analyze/lower/emit/run chain, and stdlib-root resolution) so integration
//! tests can drive them directly instead of shelling out to the binary.

pub mod config;
pub mod driver;
pub mod project;
