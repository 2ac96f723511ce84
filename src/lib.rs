//! releasecheck: disposal-ownership analysis
//!
//! This library decides, for a host-supplied semantic model, whether
//! every value carrying a disposal contract is released exactly once on
//! every path, and describes structured fixes for the violations it
//! finds.

pub mod analysis;
pub mod model;
pub mod output;
pub mod testing;

pub use analysis::{
    Analyzer, CancelToken, Config, ContractKind, DisposableContract, Search, Violation,
    ViolationKind,
};
pub use model::SemanticModel;
