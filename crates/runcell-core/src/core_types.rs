//! Shared data model for the execution service.
//!
//! Defines the immutable language catalog, the request/result pair that
//! crosses the caller boundary, and the per-context lifecycle state. The
//! catalog is fixed at build time and safe for concurrent reads; requests
//! and results are owned values that are never mutated after creation.

use std::fmt;

/// Identifies a supported execution target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Python,
    JavaScript,
}

impl LanguageId {
    /// Catalog entry backing this id.
    pub fn info(self) -> &'static Language {
        match self {
            LanguageId::Python => &LANGUAGES[0],
            LanguageId::JavaScript => &LANGUAGES[1],
        }
    }

    pub fn display_name(self) -> &'static str {
        self.info().name
    }
}

/// Catalog entry describing one supported language.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub id: LanguageId,
    pub name: &'static str,
    /// Substrings a caller-supplied name is matched against.
    pub aliases: &'static [&'static str],
    /// Identifier of the blocking-read primitive, for languages whose
    /// execution model has one.
    pub input_call: Option<&'static str>,
}

/// The supported-language catalog. Order matters for name resolution:
/// entries are checked front to back and the first match wins.
pub const LANGUAGES: &[Language] = &[
    Language {
        id: LanguageId::Python,
        name: "Python",
        aliases: &["python"],
        input_call: Some("input"),
    },
    Language {
        id: LanguageId::JavaScript,
        name: "JavaScript",
        aliases: &["javascript", "js", "node"],
        input_call: None,
    },
];

/// Resolves a caller-supplied language name against the catalog.
///
/// Matching is case-insensitive substring matching on the aliases, so
/// names like "Python 3.11" or "Node 20" still route to the right
/// context. Returns `None` for names that match nothing.
pub fn resolve_language(name: &str) -> Option<&'static Language> {
    let lowered = name.to_lowercase();
    LANGUAGES
        .iter()
        .find(|language| language.aliases.iter().any(|alias| lowered.contains(alias)))
}

/// One execution submission. The preprocessor produces a new request
/// with rewritten source rather than mutating an existing one.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Raw caller-supplied language name; resolved by the dispatcher.
    pub language: String,
    pub source_code: String,
    pub stdin: String,
}

impl ExecutionRequest {
    pub fn new(
        language: impl Into<String>,
        source_code: impl Into<String>,
        stdin: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            stdin: stdin.into(),
        }
    }
}

/// Captured output of one run. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    /// Result carrying only explanatory stderr text.
    pub fn stderr_only(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
        }
    }
}

/// Lifecycle state of one execution context.
///
/// Transitions within a context instance are monotonic:
/// `Idle -> Loading -> (Ready | Error)`. An errored context stays errored
/// until it is explicitly restarted with a fresh instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Idle,
    Loading { message: Option<String> },
    Ready,
    Error { message: String },
}

impl RuntimeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, RuntimeStatus::Ready)
    }

    /// Ready and Error end a context instance's startup; nothing follows
    /// them except an explicit restart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuntimeStatus::Ready | RuntimeStatus::Error { .. })
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Idle => write!(f, "idle"),
            RuntimeStatus::Loading { message: Some(message) } => {
                write!(f, "loading ({})", message)
            }
            RuntimeStatus::Loading { message: None } => write!(f, "loading"),
            RuntimeStatus::Ready => write!(f, "ready"),
            RuntimeStatus::Error { message } => write!(f, "error: {}", message),
        }
    }
}
