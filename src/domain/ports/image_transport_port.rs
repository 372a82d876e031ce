//! Port for the network transport that fetches artwork bytes.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::domain::errors::TransportError;

/// Asynchronous GET of a remote resource.
/// Implementations must be thread-safe; HTTP semantics, TLS and retries live here.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Fetches the full body at `url`.
    async fn get(&self, url: &Url) -> Result<Bytes, TransportError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tokio::sync::{Notify, oneshot};

    type Reply = Result<Bytes, TransportError>;

    #[derive(Default)]
    struct MockState {
        calls: Vec<String>,
        parked: HashMap<String, Vec<oneshot::Sender<Reply>>>,
    }

    /// Transport whose fetches either answer at once or park until released.
    pub struct MockTransport {
        state: Mutex<MockState>,
        immediate: Option<Reply>,
        started: Notify,
    }

    impl MockTransport {
        /// Every fetch parks until [`MockTransport::release`] is called for its URL.
        pub fn gated() -> Self {
            Self {
                state: Mutex::new(MockState::default()),
                immediate: None,
                started: Notify::new(),
            }
        }

        /// Every fetch answers immediately with `reply`.
        pub fn immediate(reply: Reply) -> Self {
            Self {
                state: Mutex::new(MockState::default()),
                immediate: Some(reply),
                started: Notify::new(),
            }
        }

        /// URLs fetched so far, in call order.
        pub fn calls(&self) -> Vec<String> {
            self.state.lock().calls.clone()
        }

        /// Number of fetches started so far.
        pub fn call_count(&self) -> usize {
            self.state.lock().calls.len()
        }

        /// Number of fetches currently parked.
        pub fn parked_count(&self) -> usize {
            self.state.lock().parked.values().map(Vec::len).sum()
        }

        /// Waits until at least `n` fetches have started.
        pub async fn wait_for_calls(&self, n: usize) {
            loop {
                let notified = self.started.notified();
                if self.call_count() >= n {
                    return;
                }
                notified.await;
            }
        }

        /// Completes every parked fetch for `url`. Returns false if none was parked.
        pub fn release(&self, url: &str, reply: Reply) -> bool {
            let senders = self.state.lock().parked.remove(url).unwrap_or_default();
            let released = !senders.is_empty();
            for tx in senders {
                let _ = tx.send(reply.clone());
            }
            released
        }
    }

    #[async_trait]
    impl ImageTransport for MockTransport {
        async fn get(&self, url: &Url) -> Result<Bytes, TransportError> {
            let rx = {
                let mut state = self.state.lock();
                state.calls.push(url.as_str().to_string());
                if let Some(reply) = &self.immediate {
                    let reply = reply.clone();
                    drop(state);
                    self.started.notify_waiters();
                    return reply;
                }
                let (tx, rx) = oneshot::channel();
                state
                    .parked
                    .entry(url.as_str().to_string())
                    .or_default()
                    .push(tx);
                rx
            };
            self.started.notify_waiters();
            rx.await.unwrap_or(Err(TransportError::Cancelled))
        }
    }
}
