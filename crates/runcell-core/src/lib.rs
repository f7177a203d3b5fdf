//! Core library for the runcell multi-runtime code execution service.
//!
//! This crate runs user-submitted source code inside long-lived,
//! per-language interpreter contexts and hands back the captured
//! standard streams. No server round trip: contexts are local
//! subprocesses managed next to the caller.
//!
//! # Architecture Overview
//!
//! - **Execution contexts**: one isolated interpreter subprocess per
//!   language, owned by a dedicated task and driven over a line-delimited
//!   JSON protocol
//! - **Lifecycle management**: per-context state machine
//!   (idle -> loading -> ready | error) with broadcast status transitions
//!   and explicit restart
//! - **Dispatch and correlation**: request ids matched to replies through
//!   a pending-call table with at-most-once resolution
//! - **Interactive input preprocessing**: blocking-read call sites are
//!   collected from the source and replaced with values gathered up
//!   front, so programs never block inside a context
//! - **Output normalization**: a single display value derived from the
//!   captured streams, classified success-like or warning-like
//! - **Configuration and session**: YAML runner config and a JSON
//!   session file remembering the last used language

pub mod config;
pub mod core_types;
pub mod dispatcher;
pub mod errors;
pub mod lifecycle;
pub mod output;
pub mod preprocess;
pub mod protocol;
pub mod runner;
pub mod runtimes;
pub mod session;

pub use config::RunnerConfig;
pub use core_types::{
    resolve_language, ExecutionRequest, ExecutionResult, Language, LanguageId, RuntimeStatus,
    LANGUAGES,
};
pub use errors::{ConfigError, DispatchError, EngineError, InputError, SessionError};
pub use output::{normalize, DisplayOutput, OutputKind};
pub use preprocess::{InputPrompt, InputSource, StaticInputSource};
pub use runner::Runner;
pub use session::{Session, SessionStore};

#[cfg(test)]
pub mod test_utils;
