//! Runtime lifecycle management.
//!
//! One slot per catalog language holds the context's status snapshot,
//! its transition broadcast, the mailbox handle, and the pending-call
//! table. Transitions within one context instance are monotonic
//! (idle -> loading -> ready | error); an errored context stays errored
//! until an explicit restart replaces the whole instance. Subscribers
//! see transitions from the point of subscription forward, no replay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::core_types::{LanguageId, RuntimeStatus, LANGUAGES};
use crate::dispatcher::{spawn_reply_pump, PendingCallTable};
use crate::errors::DispatchError;
use crate::protocol::{Envelope, WorkerReply, WorkerRequest};
use crate::runtimes::{spawn_context, ContextHandle, RuntimeEngine, StatusPublisher};

/// Builds a fresh engine for a language. Called on `start` and again on
/// every `restart`.
pub type EngineFactory = Box<dyn Fn(LanguageId) -> Box<dyn RuntimeEngine> + Send + Sync>;

const STATUS_CHANNEL_CAPACITY: usize = 64;

struct Slot {
    state: Arc<StdMutex<RuntimeStatus>>,
    transitions: broadcast::Sender<RuntimeStatus>,
    handle: Option<ContextHandle>,
    pending: PendingCallTable,
    worker: Option<JoinHandle<()>>,
    router: Option<JoinHandle<()>>,
}

impl Slot {
    fn new() -> Self {
        let (transitions, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(StdMutex::new(RuntimeStatus::Idle)),
            transitions,
            handle: None,
            pending: PendingCallTable::new(),
            worker: None,
            router: None,
        }
    }

    fn snapshot(&self) -> RuntimeStatus {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Discards the running instance: tasks aborted, child reaped via
    /// kill-on-drop, in-flight callers unblocked with a closed channel.
    /// The broadcast sender survives so existing subscribers keep
    /// receiving transitions from the next instance.
    async fn teardown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if let Some(router) = self.router.take() {
            router.abort();
        }
        self.handle = None;
        self.pending.close().await;
        self.pending = PendingCallTable::new();
        self.state = Arc::new(StdMutex::new(RuntimeStatus::Idle));
    }
}

/// Owns every execution context and is the only path to them.
pub struct RuntimeManager {
    slots: Mutex<HashMap<LanguageId, Slot>>,
    factory: EngineFactory,
}

impl RuntimeManager {
    pub fn new(factory: EngineFactory) -> Self {
        let mut slots = HashMap::new();
        for language in LANGUAGES {
            slots.insert(language.id, Slot::new());
        }
        Self {
            slots: Mutex::new(slots),
            factory,
        }
    }

    /// Starts the context for `language` if it has never run. No-op while
    /// loading or ready, and also in `error`: an errored context revives
    /// only through [`RuntimeManager::restart`].
    pub async fn start(&self, language: LanguageId) {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(language).or_insert_with(Slot::new);
        match slot.snapshot() {
            RuntimeStatus::Loading { .. } | RuntimeStatus::Ready => {
                log::debug!("{} context already started", language.display_name());
            }
            RuntimeStatus::Error { .. } => {
                log::debug!(
                    "{} context previously failed; restart to try again",
                    language.display_name()
                );
            }
            RuntimeStatus::Idle => self.launch(slot, language),
        }
    }

    /// Starts every language in the catalog.
    pub async fn start_all(&self) {
        for language in LANGUAGES {
            self.start(language.id).await;
        }
    }

    /// Discards the current context instance for `language` (whatever its
    /// state) and starts a fresh one.
    pub async fn restart(&self, language: LanguageId) {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(language).or_insert_with(Slot::new);
        log::info!("Restarting {} context", language.display_name());
        slot.teardown().await;
        self.launch(slot, language);
    }

    fn launch(&self, slot: &mut Slot, language: LanguageId) {
        let publisher = StatusPublisher::new(slot.state.clone(), slot.transitions.clone());
        publisher.publish(RuntimeStatus::Loading { message: None });
        let engine = (self.factory)(language);
        let (handle, replies, worker) = spawn_context(engine, publisher);
        slot.router = Some(spawn_reply_pump(replies, slot.pending.clone()));
        slot.handle = Some(handle);
        slot.worker = Some(worker);
    }

    /// Current status snapshot for `language`.
    pub async fn status(&self, language: LanguageId) -> RuntimeStatus {
        let mut slots = self.slots.lock().await;
        slots.entry(language).or_insert_with(Slot::new).snapshot()
    }

    /// Subscribes to status transitions for `language`, from now forward.
    pub async fn subscribe(&self, language: LanguageId) -> broadcast::Receiver<RuntimeStatus> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(language)
            .or_insert_with(Slot::new)
            .transitions
            .subscribe()
    }

    /// Waits for the context to reach `ready` or `error` and returns that
    /// status. Returns immediately when the context was never started
    /// (still idle) so callers cannot wait on nothing.
    pub async fn wait_until_settled(&self, language: LanguageId) -> RuntimeStatus {
        // subscribe before sampling so a transition landing in between
        // is seen on the channel rather than missed
        let (mut transitions, snapshot) = {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(language).or_insert_with(Slot::new);
            (slot.transitions.subscribe(), slot.snapshot())
        };
        if matches!(snapshot, RuntimeStatus::Idle) || snapshot.is_terminal() {
            return snapshot;
        }
        loop {
            match transitions.recv().await {
                Ok(status) if status.is_terminal() => return status,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "{} status subscriber lagged by {} transitions",
                        language.display_name(),
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return self.status(language).await;
                }
            }
        }
    }

    /// Hands a run request to the context for `language`. On success the
    /// returned receiver resolves with the context's reply; a dropped
    /// receiver end means the instance was torn down first.
    pub async fn dispatch(
        &self,
        language: LanguageId,
        request: WorkerRequest,
    ) -> Result<oneshot::Receiver<WorkerReply>, DispatchError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(language).or_insert_with(Slot::new);
        match slot.snapshot() {
            RuntimeStatus::Ready => {}
            RuntimeStatus::Idle | RuntimeStatus::Loading { .. } => {
                return Err(DispatchError::NotReady(language));
            }
            RuntimeStatus::Error { message } => {
                return Err(DispatchError::Failed(language, message));
            }
        }
        let handle = match &slot.handle {
            Some(handle) => handle.clone(),
            None => return Err(DispatchError::Unavailable(language)),
        };
        let (id, receiver) = slot.pending.register().await;
        if !handle.submit(Envelope { id, request }) {
            slot.pending.discard(id).await;
            return Err(DispatchError::Unavailable(language));
        }
        Ok(receiver)
    }
}
