//! Execution contexts: long-lived, per-language interpreter runtimes.
//!
//! Each context is an isolated runtime owned by a dedicated task (its
//! actor). The orchestrator talks to a context only through its mailbox;
//! replies come back on a correlation channel and status transitions go
//! out through the context's status publisher. A context initializes
//! once, announces the terminal outcome, and then serves run requests one
//! message cycle at a time until every handle to its mailbox is dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::core_types::{LanguageId, RuntimeStatus};
use crate::errors::EngineError;
use crate::protocol::{Envelope, ReplyEnvelope, WorkerReply, WorkerRequest};

pub mod driver;
pub mod javascript;
pub mod python;

/// Publishes lifecycle transitions for one context instance: updates the
/// polled snapshot and fans the transition out to broadcast subscribers.
/// Terminal states win: once `Ready` or `Error` is published, later
/// publishes from the same instance are ignored.
#[derive(Clone)]
pub struct StatusPublisher {
    state: Arc<Mutex<RuntimeStatus>>,
    sender: broadcast::Sender<RuntimeStatus>,
}

impl StatusPublisher {
    pub fn new(state: Arc<Mutex<RuntimeStatus>>, sender: broadcast::Sender<RuntimeStatus>) -> Self {
        Self { state, sender }
    }

    pub fn publish(&self, status: RuntimeStatus) {
        {
            let mut current = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if current.is_terminal() {
                log::warn!(
                    "Ignoring status transition to '{}' after terminal state '{}'",
                    status,
                    current
                );
                return;
            }
            *current = status.clone();
        }
        // a send error just means nobody is subscribed right now
        let _ = self.sender.send(status);
    }
}

/// One language runtime implementation, driven by its owning context
/// task. Implementations own all interpreter state; nothing outside the
/// task ever touches it.
#[async_trait]
pub trait RuntimeEngine: Send {
    fn language(&self) -> LanguageId;

    /// Brings the runtime to a usable state, reporting progress through
    /// the publisher. The owning task publishes the terminal transition
    /// based on the outcome.
    async fn initialize(&mut self, status: &StatusPublisher) -> Result<(), EngineError>;

    /// Runs one program to completion.
    async fn execute(&mut self, code: &str, stdin: &str) -> Result<WorkerReply, EngineError>;

    /// Releases runtime resources. Called once when the context drains.
    async fn shutdown(&mut self) {}
}

/// Cheap-to-clone handle for submitting work to a context's mailbox.
#[derive(Clone)]
pub struct ContextHandle {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl ContextHandle {
    /// Queues an envelope; returns false when the context is gone.
    pub fn submit(&self, envelope: Envelope) -> bool {
        self.sender.send(envelope).is_ok()
    }
}

/// Spawns the actor task owning `engine`.
///
/// The task initializes the engine, publishes the terminal lifecycle
/// transition, then serves the mailbox. Requests execute one per message
/// cycle, a deliberately stricter discipline than the reply protocol
/// requires; replies still carry their own correlation ids and resolve
/// independently. Mailbox delivery order is FIFO.
pub fn spawn_context(
    mut engine: Box<dyn RuntimeEngine>,
    status: StatusPublisher,
) -> (
    ContextHandle,
    mpsc::UnboundedReceiver<ReplyEnvelope>,
    JoinHandle<()>,
) {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Envelope>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<ReplyEnvelope>();

    let worker = tokio::spawn(async move {
        let name = engine.language().display_name();
        match engine.initialize(&status).await {
            Ok(()) => {
                log::info!("{} context ready", name);
                status.publish(RuntimeStatus::Ready);
            }
            Err(err) => {
                log::error!("{} context failed to initialize: {}", name, err);
                status.publish(RuntimeStatus::Error {
                    message: err.to_string(),
                });
                engine.shutdown().await;
                return;
            }
        }

        while let Some(Envelope { id, request }) = command_rx.recv().await {
            let WorkerRequest::Run { code, stdin } = request;
            let reply = match engine.execute(&code, &stdin).await {
                Ok(reply) => reply,
                Err(err) => {
                    log::warn!("{} context run failed: {}", name, err);
                    WorkerReply::Error {
                        error: err.to_string(),
                    }
                }
            };
            if reply_tx.send(ReplyEnvelope { id, reply }).is_err() {
                break;
            }
        }
        engine.shutdown().await;
    });

    (ContextHandle { sender: command_tx }, reply_rx, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockEngine;

    fn publisher() -> (StatusPublisher, broadcast::Receiver<RuntimeStatus>) {
        let state = Arc::new(Mutex::new(RuntimeStatus::Idle));
        let (sender, receiver) = broadcast::channel(16);
        (StatusPublisher::new(state, sender), receiver)
    }

    #[tokio::test]
    async fn context_publishes_ready_and_serves_requests() {
        let (status, mut transitions) = publisher();
        let engine = Box::new(MockEngine::ready(LanguageId::Python));
        let (handle, mut replies, _worker) = spawn_context(engine, status);

        assert_eq!(
            transitions.recv().await.unwrap(),
            RuntimeStatus::Loading { message: Some("warming up".into()) }
        );
        assert_eq!(transitions.recv().await.unwrap(), RuntimeStatus::Ready);

        let submitted = handle.submit(Envelope {
            id: 7,
            request: WorkerRequest::Run { code: "echo me".into(), stdin: "".into() },
        });
        assert!(submitted);

        let ReplyEnvelope { id, reply } = replies.recv().await.unwrap();
        assert_eq!(id, 7);
        assert_eq!(
            reply,
            WorkerReply::Result { stdout: "echo me".into(), stderr: "".into() }
        );
    }

    #[tokio::test]
    async fn failed_initialization_publishes_error_and_exits() {
        let (status, mut transitions) = publisher();
        let engine = Box::new(MockEngine::failing(LanguageId::Python, "no interpreter"));
        let (handle, _replies, worker) = spawn_context(engine, status);

        loop {
            match transitions.recv().await.unwrap() {
                RuntimeStatus::Error { message } => {
                    assert!(message.contains("no interpreter"));
                    break;
                }
                RuntimeStatus::Loading { .. } => continue,
                other => panic!("unexpected transition: {}", other),
            }
        }

        worker.await.unwrap();
        // the mailbox is closed once the task exits
        assert!(!handle.submit(Envelope {
            id: 1,
            request: WorkerRequest::Run { code: "".into(), stdin: "".into() },
        }));
    }

    #[tokio::test]
    async fn engine_failures_become_error_replies() {
        let (status, _transitions) = publisher();
        let engine = Box::new(
            MockEngine::ready(LanguageId::JavaScript).with_execute_error("interpreter hung up"),
        );
        let (handle, mut replies, _worker) = spawn_context(engine, status);

        assert!(handle.submit(Envelope {
            id: 3,
            request: WorkerRequest::Run { code: "x".into(), stdin: "".into() },
        }));
        let ReplyEnvelope { id, reply } = replies.recv().await.unwrap();
        assert_eq!(id, 3);
        match reply {
            WorkerReply::Error { error } => assert!(error.contains("interpreter hung up")),
            other => panic!("expected an error reply, got {:?}", other),
        }

        // the context survives a failed run and serves the next request
        assert!(handle.submit(Envelope {
            id: 9,
            request: WorkerRequest::Run { code: "ping".into(), stdin: "".into() },
        }));
        let ReplyEnvelope { id, reply } = replies.recv().await.unwrap();
        assert_eq!(id, 9);
        assert_eq!(
            reply,
            WorkerReply::Result { stdout: "ping".into(), stderr: "".into() }
        );
    }

    #[test]
    fn publisher_ignores_transitions_after_terminal() {
        let state = Arc::new(Mutex::new(RuntimeStatus::Idle));
        let (sender, mut receiver) = broadcast::channel(16);
        let status = StatusPublisher::new(Arc::clone(&state), sender);

        status.publish(RuntimeStatus::Loading { message: None });
        status.publish(RuntimeStatus::Ready);
        status.publish(RuntimeStatus::Loading { message: Some("late".into()) });

        assert_eq!(
            receiver.try_recv().unwrap(),
            RuntimeStatus::Loading { message: None }
        );
        assert_eq!(receiver.try_recv().unwrap(), RuntimeStatus::Ready);
        assert!(receiver.try_recv().is_err());
        assert_eq!(*state.lock().unwrap(), RuntimeStatus::Ready);
    }
}
