//! Search-session generation counter.
//!
//! Each new search session bumps the counter. Requests capture the value at
//! submission; a request whose captured value no longer matches is stale and
//! must not touch the UI, while its network and decode work finishes normally.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic epoch marker.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: AtomicU64,
}

impl GenerationCounter {
    /// Creates a counter at generation zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Returns the current generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Starts a new session, invalidating every previously captured generation.
    /// Returns the new generation.
    pub fn bump(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns true if `captured` belongs to an earlier session.
    #[must_use]
    pub fn is_stale(&self, captured: u64) -> bool {
        captured != self.current()
    }
}
