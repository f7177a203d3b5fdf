//! Shared test fixtures.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::core_types::{LanguageId, RuntimeStatus};
use crate::errors::EngineError;
use crate::protocol::WorkerReply;
use crate::runtimes::{RuntimeEngine, StatusPublisher};

/// Scriptable engine for exercising the orchestrator without real
/// interpreter processes. Unless scripted otherwise it initializes
/// successfully and echoes submitted code back as stdout.
pub struct MockEngine {
    language: LanguageId,
    fail_init: Option<String>,
    stall_init: bool,
    stall_execute: bool,
    execute_error: Option<String>,
    replies: VecDeque<WorkerReply>,
}

impl MockEngine {
    /// Initializes successfully and echoes code as stdout.
    pub fn ready(language: LanguageId) -> Self {
        Self {
            language,
            fail_init: None,
            stall_init: false,
            stall_execute: false,
            execute_error: None,
            replies: VecDeque::new(),
        }
    }

    /// Fails initialization with the given message.
    pub fn failing(language: LanguageId, message: &str) -> Self {
        Self {
            fail_init: Some(message.to_string()),
            ..Self::ready(language)
        }
    }

    /// Never finishes initializing; the context stays in loading.
    pub fn stalled(language: LanguageId) -> Self {
        Self {
            stall_init: true,
            ..Self::ready(language)
        }
    }

    /// Scripted replies served before falling back to echoing.
    pub fn with_replies(mut self, replies: Vec<WorkerReply>) -> Self {
        self.replies = replies.into();
        self
    }

    /// Makes the next execute call fail at the engine level.
    pub fn with_execute_error(mut self, message: &str) -> Self {
        self.execute_error = Some(message.to_string());
        self
    }

    /// Accepts runs but never replies to them.
    pub fn with_stalled_execute(mut self) -> Self {
        self.stall_execute = true;
        self
    }
}

#[async_trait]
impl RuntimeEngine for MockEngine {
    fn language(&self) -> LanguageId {
        self.language
    }

    async fn initialize(&mut self, status: &StatusPublisher) -> Result<(), EngineError> {
        status.publish(RuntimeStatus::Loading {
            message: Some("warming up".into()),
        });
        if self.stall_init {
            std::future::pending::<()>().await;
        }
        match self.fail_init.take() {
            Some(message) => Err(EngineError::Bootstrap(message)),
            None => Ok(()),
        }
    }

    async fn execute(&mut self, code: &str, _stdin: &str) -> Result<WorkerReply, EngineError> {
        if self.stall_execute {
            std::future::pending::<()>().await;
        }
        if let Some(message) = self.execute_error.take() {
            return Err(EngineError::Protocol(message));
        }
        Ok(self.replies.pop_front().unwrap_or_else(|| WorkerReply::Result {
            stdout: code.to_string(),
            stderr: String::new(),
        }))
    }
}
