//! FIFO download queue with an active-fetch gate.
//!
//! The gate admits at most `max_concurrent` fetches. Excess fetches wait in
//! strict arrival order and are started only when a running fetch releases
//! its slot.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::trace;

/// Default number of simultaneous fetches.
pub const MAX_CONCURRENT: usize = 6;

/// Result of asking the gate for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken; the caller must start the fetch and later release it.
    Start,
    /// No slot was free; the fetch waits at this 1-based queue position.
    Queued(usize),
}

#[derive(Debug, Default)]
struct QueueState {
    waiting: VecDeque<String>,
    active: usize,
    peak_active: usize,
}

impl QueueState {
    fn take_slot(&mut self) {
        self.active += 1;
        self.peak_active = self.peak_active.max(self.active);
    }
}

/// Queue of fetch keys plus the active-count gate, guarded together.
#[derive(Debug)]
pub struct DownloadQueue {
    state: Mutex<QueueState>,
    max_concurrent: usize,
}

impl DownloadQueue {
    /// Creates a queue admitting up to `max_concurrent` active fetches (at least one).
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Takes a slot for `key` or appends it to the queue.
    pub fn admit(&self, key: String) -> Admission {
        let mut state = self.state.lock();
        if state.active < self.max_concurrent {
            state.take_slot();
            trace!(key = %key, active = state.active, "Fetch admitted");
            Admission::Start
        } else {
            state.waiting.push_back(key);
            Admission::Queued(state.waiting.len())
        }
    }

    /// Releases a slot held by a finished fetch.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
    }

    /// Pops the oldest queued key if a slot is free, taking the slot for it.
    pub fn next_ready(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.active >= self.max_concurrent {
            return None;
        }
        let key = state.waiting.pop_front()?;
        state.take_slot();
        Some(key)
    }

    /// Keeps only queued keys for which `keep` returns true, preserving order.
    /// Returns the removed keys.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut state = self.state.lock();
        let mut removed = Vec::new();
        state.waiting.retain(|key| {
            let kept = keep(key);
            if !kept {
                removed.push(key.clone());
            }
            kept
        });
        removed
    }

    /// Removes every queued key.
    pub fn drain(&self) -> Vec<String> {
        self.state.lock().waiting.drain(..).collect()
    }

    /// Number of fetches holding a slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// Number of queued fetches.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.lock().waiting.len()
    }

    /// Highest active count observed.
    #[must_use]
    pub fn peak_active(&self) -> usize {
        self.state.lock().peak_active
    }

    /// Configured slot count.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit_then_queues() {
        let queue = DownloadQueue::new(2);
        assert_eq!(queue.admit("a".into()), Admission::Start);
        assert_eq!(queue.admit("b".into()), Admission::Start);
        assert_eq!(queue.admit("c".into()), Admission::Queued(1));
        assert_eq!(queue.admit("d".into()), Admission::Queued(2));
        assert_eq!(queue.active(), 2);
        assert_eq!(queue.queued(), 2);
    }

    #[test]
    fn test_next_ready_is_fifo_and_gated() {
        let queue = DownloadQueue::new(1);
        queue.admit("a".into());
        queue.admit("b".into());
        queue.admit("c".into());

        assert_eq!(queue.next_ready(), None);
        queue.release();
        assert_eq!(queue.next_ready().as_deref(), Some("b"));
        assert_eq!(queue.next_ready(), None);
        queue.release();
        assert_eq!(queue.next_ready().as_deref(), Some("c"));
        queue.release();
        assert_eq!(queue.next_ready(), None);
        assert_eq!(queue.active(), 0);
        assert_eq!(queue.peak_active(), 1);
    }

    #[test]
    fn test_retain_preserves_order() {
        let queue = DownloadQueue::new(1);
        queue.admit("running".into());
        for key in ["a", "b", "c", "d"] {
            queue.admit(key.into());
        }

        let removed = queue.retain(|key| key != "b" && key != "d");
        assert_eq!(removed, vec!["b".to_string(), "d".to_string()]);

        queue.release();
        assert_eq!(queue.next_ready().as_deref(), Some("a"));
        queue.release();
        assert_eq!(queue.next_ready().as_deref(), Some("c"));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let queue = DownloadQueue::new(0);
        assert_eq!(queue.max_concurrent(), 1);
        assert_eq!(queue.admit("a".into()), Admission::Start);
    }

    #[test]
    fn test_release_never_underflows() {
        let queue = DownloadQueue::default();
        queue.release();
        assert_eq!(queue.active(), 0);
    }
}
