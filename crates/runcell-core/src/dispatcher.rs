//! Request correlation between callers and execution contexts.
//!
//! Every dispatched run is tracked by a numeric request id and a parked
//! oneshot sender. Replies coming back from a context resolve the
//! matching slot at most once; a second reply carrying the same id finds
//! no slot and is dropped with a warning. Ids are allocated from a
//! counter that is never reused within a context's lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::protocol::{ReplyEnvelope, WorkerReply};

/// In-flight calls for one execution context.
#[derive(Clone)]
pub struct PendingCallTable {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<WorkerReply>>>>,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Allocates a request id and parks a resolution slot for it.
    pub async fn register(&self) -> (u64, oneshot::Receiver<WorkerReply>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(id, sender);
        (id, receiver)
    }

    /// Resolves the call for `id` with this reply. The slot is removed
    /// first, so only the earliest reply for an id ever reaches the
    /// caller.
    pub async fn resolve(&self, id: u64, reply: WorkerReply) {
        let slot = self.pending.lock().await.remove(&id);
        match slot {
            Some(sender) => {
                if sender.send(reply).is_err() {
                    log::debug!("Caller for request {} went away before its reply", id);
                }
            }
            None => log::warn!("Dropping reply for unknown request id: {}", id),
        }
    }

    /// Forgets a registered call whose request never made it to the
    /// context.
    pub async fn discard(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Discards every outstanding slot. Waiting callers observe a closed
    /// channel instead of pending forever.
    pub async fn close(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            log::warn!(
                "Discarding {} in-flight call(s) during context teardown",
                pending.len()
            );
        }
        pending.clear();
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes replies coming out of a context's mailbox back to their
/// registered callers. Ends when the context drops its reply sender.
pub fn spawn_reply_pump(
    mut replies: mpsc::UnboundedReceiver<ReplyEnvelope>,
    table: PendingCallTable,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = replies.recv().await {
            table.resolve(envelope.id, envelope.reply).await;
        }
    })
}
