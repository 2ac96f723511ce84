//! Test support: fluent model builders and expectation helpers.
//!
//! Available outside `#[cfg(test)]` so integration tests and downstream
//! consumers can construct models without hand-writing symbol structs.

pub mod builder;
pub mod expect;

pub use builder::{BlockBuilder, CfgBuilder, MethodBuilder, ModelBuilder, TypeBuilder};
pub use expect::{apply_fix, assert_clean, assert_violations};
