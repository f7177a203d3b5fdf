//! Output normalization for displaying execution results.
//!
//! Reduces a captured result to the single value a caller should show:
//! stdout when the run produced any, stderr otherwise. Pure classification
//! only; rendering and history side effects belong to the caller.

use crate::core_types::ExecutionResult;

/// Classification of a normalized result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// The run produced stdout text.
    Success,
    /// Nothing on stdout; the display value falls back to stderr.
    Warning,
}

/// A result reduced to its display value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOutput<'a> {
    pub text: &'a str,
    pub kind: OutputKind,
}

/// Picks the display value for a result: stdout if non-empty, else
/// stderr.
pub fn normalize(result: &ExecutionResult) -> DisplayOutput<'_> {
    if result.stdout.is_empty() {
        DisplayOutput {
            text: &result.stderr,
            kind: OutputKind::Warning,
        }
    } else {
        DisplayOutput {
            text: &result.stdout,
            kind: OutputKind::Success,
        }
    }
}
