//! Session command queue
//!
//! Operations on one connection run strictly one after another, in the order
//! they were enqueued, even when an earlier operation suspends longer than a
//! later one. Each operation is a task that waits for the completion signal
//! of its predecessor before it starts.
//!
//! ```text
//!  enqueue(op1)      enqueue(op2)      enqueue(op3)
//!      │                 │                 │
//!      ▼                 ▼                 ▼
//!    [op1] ──done──▶   [op2] ──done──▶   [op3]
//! ```
//!
//! A failed or panicked operation still signals completion, so later
//! operations are never stuck behind it. Releasing a connection cancels every
//! operation still waiting or running for it; those resolve with
//! [`Error::NotConnected`].

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use thermalink_types::ConnectionId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Error, Result};

#[derive(Default)]
struct Chain {
    /// Completion signal of the last enqueued operation
    tail: Option<oneshot::Receiver<()>>,
    cancel: CancellationToken,
}

/// Per-connection ordered execution of operations
#[derive(Default)]
pub(crate) struct CommandQueue {
    chains: Mutex<HashMap<ConnectionId, Chain>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation to the chain of `id`
    ///
    /// Returns immediately; the handle resolves with the operation's result
    /// once it has run.
    pub fn enqueue<F, Fut, T>(&self, id: &ConnectionId, op: F) -> JoinHandle<Result<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let (previous, cancel) = {
            let mut chains = self.chains.lock();
            let chain = chains.entry(id.clone()).or_default();
            (chain.tail.replace(done_rx), chain.cancel.clone())
        };

        let id = id.clone();
        tokio::spawn(async move {
            let run = async move {
                if let Some(previous) = previous {
                    // Err means the predecessor panicked or was cancelled
                    let _ = previous.await;
                }
                op().await
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(connection_id = %id, "Queued operation released");
                    Err(Error::NotConnected)
                }
                result = run => result,
            };

            let _ = done_tx.send(());
            result
        })
    }

    /// Cancel every operation still queued for `id` and forget its chain
    pub fn release(&self, id: &ConnectionId) {
        if let Some(chain) = self.chains.lock().remove(id) {
            chain.cancel.cancel();
        }
    }

    /// Number of connections with a chain
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.chains.lock().len()
    }
}

/// Await a queued operation, surfacing a panic inside it
pub(crate) async fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(Error::NotConnected),
    }
}
