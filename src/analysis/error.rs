//! Error types for the analysis pipeline.
//!
//! Lookups that can simply fail ("no release method here") return
//! `Option` and never surface as errors. The variants below are the
//! only ways a pass stops early: the caller asked it to, or an internal
//! invariant broke for one symbol.

use thiserror::Error;

use crate::model::TypeId;

/// Why analysis of a symbol stopped before producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The caller's cancellation token fired.
    #[error("analysis interrupted by caller")]
    Interrupted,

    /// The base-type chain revisited a type. The inheritance lattice is
    /// cycle-free by construction, so this is a malformed model; it is
    /// fatal for the symbol being analyzed only.
    #[error("inheritance cycle detected while resolving type {0:?}")]
    InheritanceCycle(TypeId),
}

impl AnalysisError {
    /// True when the whole pass should stop, not just the current symbol.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, AnalysisError::Interrupted)
    }
}
