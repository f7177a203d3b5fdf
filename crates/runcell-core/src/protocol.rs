//! Wire protocol between the orchestrator and execution contexts.
//!
//! Messages travel as single lines of JSON over a context subprocess's
//! stdin/stdout. Every message carries a `kind` discriminant; reply
//! fields decode to empty values when missing, so a malformed reply
//! degrades to an empty result instead of failing the request.

use serde::{Deserialize, Serialize};

use crate::core_types::RuntimeStatus;

/// Request sent to an execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerRequest {
    Run { code: String, stdin: String },
}

/// Terminal reply from an execution context.
///
/// `Result` covers completed runs, including user-code failures, which
/// arrive as captured stderr text. `Error` is reserved for context-level
/// failures (interpreter gone, bootstrap broken). Both end the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerReply {
    Result {
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        stderr: String,
    },
    Error {
        #[serde(default)]
        error: String,
    },
}

/// Lifecycle announcement from a context bootstrap during startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StatusMessage {
    Loading {
        #[serde(default)]
        message: Option<String>,
    },
    Ready,
    Error {
        #[serde(default)]
        error: String,
    },
}

impl From<StatusMessage> for RuntimeStatus {
    fn from(message: StatusMessage) -> Self {
        match message {
            StatusMessage::Loading { message } => RuntimeStatus::Loading { message },
            StatusMessage::Ready => RuntimeStatus::Ready,
            StatusMessage::Error { error } => RuntimeStatus::Error { message: error },
        }
    }
}

/// Mailbox message pairing a request with its correlation id.
#[derive(Debug)]
pub struct Envelope {
    pub id: u64,
    pub request: WorkerRequest,
}

/// Reply paired with the correlation id of the request it answers.
#[derive(Debug)]
pub struct ReplyEnvelope {
    pub id: u64,
    pub reply: WorkerReply,
}
