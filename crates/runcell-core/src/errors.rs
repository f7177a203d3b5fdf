//! Error types for the execution service.
//!
//! Internal failures are typed per concern. None of these cross the
//! caller-facing run boundary: the dispatcher and runner convert every
//! failure into result text, so callers always see data, never an error.

use thiserror::Error;

use crate::core_types::LanguageId;

/// Failures inside a runtime engine: interpreter resolution, child
/// process management, and the wire protocol.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No usable interpreter found (tried {tried})")]
    InterpreterNotFound { tried: String },
    #[error("Failed to spawn interpreter '{command}': {message}")]
    SpawnFailed { command: String, message: String },
    #[error("Runtime bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("Runtime terminated unexpectedly")]
    Terminated,
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("I/O error talking to runtime: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a run request could not be handed to a context. The display text
/// is exactly what callers see in the result's stderr.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{} runtime is not ready", .0.display_name())]
    NotReady(LanguageId),
    #[error("{} runtime unavailable: {}", .0.display_name(), .1)]
    Failed(LanguageId, String),
    #[error("{} runtime unavailable", .0.display_name())]
    Unavailable(LanguageId),
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unknown language '{0}' in runtimes section")]
    UnknownLanguage(String),
    #[error("Runtimes section names '{0}' and '{1}' for the same language")]
    DuplicateOverride(String, String),
}

/// Session persistence failures.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse session file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine home directory")]
    NoHome,
}

/// Failures while collecting interactive input values.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input collection aborted: {0}")]
    Aborted(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
