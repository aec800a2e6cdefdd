//! Cooperative cancellation shared between the signal handler and the resolver.

use crate::error::{Result, VenError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable flag checked at copy, fetch, and recursion checkpoints.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(VenError::Cancelled)` once the token has been triggered.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VenError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.checkpoint().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.checkpoint(), Err(VenError::Cancelled)));
    }
}
