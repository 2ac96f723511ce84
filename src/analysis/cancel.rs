//! Cooperative cancellation.
//!
//! The engine never suspends; long walks (chain resolution, dataflow
//! iteration) poll the token at loop boundaries so a caller can abandon
//! analysis of pathological input without corrupting shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::AnalysisError;

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Poll point for loops: errors out once cancellation is requested.
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_live_and_stays_cancelled() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());

        let clone = token.clone();
        clone.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(AnalysisError::Interrupted));
        // cancelling twice is a no-op
        token.cancel();
        assert!(token.is_cancelled());
    }
}
