// Session epochs
//
// Shutdown advances the epoch. Work that
// finishes off the frame loop holds the token it was started with and
// checks it before acting; a token from an older epoch means the session
// it belonged to has been superseded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared generation counter
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    current: Arc<AtomicU64>,
}

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the current generation
    pub fn token(&self) -> EpochToken {
        EpochToken {
            current: Arc::clone(&self.current),
            generation: self.current.load(Ordering::Acquire),
        }
    }

    /// Invalidate every outstanding token; returns the new generation
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

/// A generation captured at some point in time
#[derive(Debug, Clone)]
pub struct EpochToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl EpochToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }

    pub fn is_stale(&self) -> bool {
        !self.is_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_goes_stale() {
        let epoch = SessionEpoch::new();
        let token = epoch.token();
        assert!(token.is_current());

        assert_eq!(epoch.advance(), 1);
        assert!(token.is_stale());
        assert!(epoch.token().is_current());
    }

    #[test]
    fn test_token_across_threads() {
        let epoch = SessionEpoch::new();
        let token = epoch.token();
        let remote = epoch.clone();
        std::thread::spawn(move || {
            remote.advance();
        })
        .join()
        .unwrap();
        assert!(token.is_stale());
        assert_eq!(epoch.current(), 1);
    }
}
