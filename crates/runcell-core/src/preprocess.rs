//! Interactive-input preprocessing.
//!
//! Languages whose execution model blocks on a read-from-stdin primitive
//! (Python's `input(...)`) cannot run inside a non-interactive context.
//! Before dispatch, this pipeline scans submitted source for such call
//! sites, collects exactly one value per site from the caller in source
//! order, and rewrites each site into a string literal holding its
//! collected value. The context only ever sees the fully non-interactive
//! program.
//!
//! The scan is a single left-to-right pass: rewritten output is not
//! re-scanned, so a collected value or prompt containing the call pattern
//! does not trigger further collection. String literals and `#` comments
//! are skipped while scanning, which also means re-scanning rewritten
//! source finds zero call sites.

use std::collections::VecDeque;
use std::ops::Range;

use async_trait::async_trait;

use crate::core_types::Language;
use crate::errors::InputError;

/// Prompt text used when a call site carries no literal prompt.
pub const DEFAULT_PROMPT: &str = "Input:";

/// A blocking-read call site found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPrompt {
    /// Prompt text carried by the call with surrounding quotes stripped,
    /// or [`DEFAULT_PROMPT`] when the call has no literal prompt.
    pub prompt_text: String,
    /// Byte range of the whole call expression in the original source.
    pub span: Range<usize>,
}

/// Supplies one value per prompt, in source order.
///
/// The preprocessor suspends on each call until the value arrives; the
/// next prompt is not issued until the previous value has been returned.
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn collect(&mut self, prompt: &InputPrompt, index: usize) -> Result<String, InputError>;
}

/// Feeds preset values in order. Once exhausted it yields empty strings,
/// the same as a user submitting an empty prompt.
pub struct StaticInputSource {
    values: VecDeque<String>,
}

impl StaticInputSource {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InputSource for StaticInputSource {
    async fn collect(&mut self, prompt: &InputPrompt, _index: usize) -> Result<String, InputError> {
        match self.values.pop_front() {
            Some(value) => Ok(value),
            None => {
                log::warn!(
                    "No preset value left for prompt '{}'; using an empty string",
                    prompt.prompt_text
                );
                Ok(String::new())
            }
        }
    }
}

/// Runs the full preprocessing pipeline for one submission.
///
/// Returns the source unchanged when the language defines no blocking-read
/// primitive or the source contains no call sites; collects zero prompts
/// in both cases.
pub async fn preprocess_source(
    language: &Language,
    source: &str,
    input: &mut dyn InputSource,
) -> Result<String, InputError> {
    let call_name = match language.input_call {
        Some(name) => name,
        None => return Ok(source.to_string()),
    };
    let prompts = scan_input_calls(source, call_name);
    if prompts.is_empty() {
        return Ok(source.to_string());
    }
    log::debug!("Collecting {} interactive input value(s)", prompts.len());
    let mut values = Vec::with_capacity(prompts.len());
    for (index, prompt) in prompts.iter().enumerate() {
        // strictly sequential: prompt N+1 is not issued until value N
        // has arrived
        let value = input.collect(prompt, index).await?;
        values.push(value);
    }
    Ok(rewrite_with_values(source, &prompts, &values))
}

/// Scans source text for call sites of the blocking-read identifier.
///
/// A call site is the bare identifier (not preceded by `.` and not part
/// of a longer identifier) followed by a balanced parenthesized argument
/// list. Occurrences inside string literals or `#` comments are ignored.
pub fn scan_input_calls(source: &str, call_name: &str) -> Vec<InputPrompt> {
    let bytes = source.as_bytes();
    let mut prompts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                if &source[start..i] != call_name || preceded_by_dot(bytes, start) {
                    continue;
                }
                let mut open = i;
                while open < bytes.len() && (bytes[open] == b' ' || bytes[open] == b'\t') {
                    open += 1;
                }
                if open >= bytes.len() || bytes[open] != b'(' {
                    continue;
                }
                if let Some(end) = find_call_end(bytes, open) {
                    let argument = source[open + 1..end - 1].trim();
                    prompts.push(InputPrompt {
                        prompt_text: prompt_from_argument(argument),
                        span: start..end,
                    });
                    i = end;
                }
            }
            _ => i += 1,
        }
    }
    prompts
}

/// Replaces each scanned call site with its collected value encoded as a
/// string literal, left to right. Prompts and values are index-aligned:
/// the Nth call site always receives the Nth value.
pub fn rewrite_with_values(source: &str, prompts: &[InputPrompt], values: &[String]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (prompt, value) in prompts.iter().zip(values) {
        out.push_str(&source[cursor..prompt.span.start]);
        out.push_str(&encode_literal(value));
        cursor = prompt.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Encodes a collected value as a double-quoted string literal. JSON
/// string encoding is a valid literal in every supported language.
fn encode_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// True when the identifier starting at `start` is an attribute access
/// (`obj.input(...)`) rather than a bare call.
fn preceded_by_dot(bytes: &[u8], start: usize) -> bool {
    let mut k = start;
    while k > 0 {
        k -= 1;
        match bytes[k] {
            b' ' | b'\t' => continue,
            b'.' => return true,
            _ => return false,
        }
    }
    false
}

/// Advances past the string literal opening at `start`, honoring
/// backslash escapes. A `'''`/`"""` opener closes only on the matching
/// triple, so quotes inside it are content. Unterminated literals run
/// to the end of input.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    if start + 3 <= bytes.len() && bytes[start + 1] == quote && bytes[start + 2] == quote {
        let mut k = start + 3;
        while k < bytes.len() {
            match bytes[k] {
                b'\\' => k += 2,
                c if c == quote
                    && k + 3 <= bytes.len()
                    && bytes[k + 1] == quote
                    && bytes[k + 2] == quote =>
                {
                    return k + 3;
                }
                _ => k += 1,
            }
        }
        return bytes.len();
    }
    let mut k = start + 1;
    while k < bytes.len() {
        match bytes[k] {
            b'\\' => k += 2,
            c if c == quote => return k + 1,
            _ => k += 1,
        }
    }
    bytes.len()
}

/// Finds the index one past the parenthesis closing the list opened at
/// `open`, skipping string literals and comments inside the arguments.
/// Returns `None` for an unbalanced list.
fn find_call_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth: usize = 0;
    let mut k = open;
    while k < bytes.len() {
        match bytes[k] {
            b'(' => {
                depth += 1;
                k += 1;
            }
            b')' => {
                depth -= 1;
                k += 1;
                if depth == 0 {
                    return Some(k);
                }
            }
            b'\'' | b'"' => {
                k = skip_string(bytes, k);
            }
            b'#' => {
                while k < bytes.len() && bytes[k] != b'\n' {
                    k += 1;
                }
            }
            _ => k += 1,
        }
    }
    None
}

/// Extracts the prompt from a call's argument text: the unescaped content
/// of a single string literal argument, or the generic prompt otherwise.
fn prompt_from_argument(argument: &str) -> String {
    let bytes = argument.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && skip_string(bytes, 0) == bytes.len() {
            let quotes = if bytes.len() >= 6 && bytes[1] == first && bytes[2] == first {
                3
            } else {
                1
            };
            return unescape(&argument[quotes..argument.len() - quotes]);
        }
    }
    DEFAULT_PROMPT.to_string()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{resolve_language, LanguageId};

    fn python() -> &'static Language {
        resolve_language("python").unwrap()
    }

    #[test]
    fn source_without_calls_is_untouched() {
        let source = "print('no reads here')\nx = 1 + 2\n";
        assert!(scan_input_calls(source, "input").is_empty());
    }

    #[test]
    fn finds_calls_in_source_order() {
        let source = "a = input(\"First:\")\nb = input('Second:')\nc = input()\n";
        let prompts = scan_input_calls(source, "input");
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0].prompt_text, "First:");
        assert_eq!(prompts[1].prompt_text, "Second:");
        assert_eq!(prompts[2].prompt_text, DEFAULT_PROMPT);
        assert!(prompts[0].span.start < prompts[1].span.start);
        assert!(prompts[1].span.start < prompts[2].span.start);
    }

    #[test]
    fn skips_literals_comments_and_lookalikes() {
        let source = concat!(
            "print(\"input(fake)\")\n",
            "# input(commented)\n",
            "reader.input(\"attr\")\n",
            "my_input(\"longer name\")\n",
            "real = input(\"Prompt:\")\n",
        );
        let prompts = scan_input_calls(source, "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "Prompt:");
    }

    #[test]
    fn non_literal_argument_gets_generic_prompt() {
        let prompts = scan_input_calls("x = input(question + \":\")\n", "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, DEFAULT_PROMPT);
    }

    #[test]
    fn nested_parens_and_embedded_quotes_balance() {
        let source = "x = input(fmt(\"a)b\", '('))\ny = input(\"Name:\")\n";
        let prompts = scan_input_calls(source, "input");
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].prompt_text, DEFAULT_PROMPT);
        assert_eq!(prompts[1].prompt_text, "Name:");
    }

    #[test]
    fn whitespace_before_argument_list_is_allowed() {
        let prompts = scan_input_calls("x = input  (\"Spaced:\")\n", "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "Spaced:");
    }

    #[test]
    fn escaped_quotes_in_prompt_are_unescaped() {
        let prompts = scan_input_calls(r#"x = input("say \"hi\"\n")"#, "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "say \"hi\"\n");
    }

    #[test]
    fn triple_quoted_blocks_are_single_literals() {
        // the apostrophe must not re-pair the quotes and expose the
        // call pattern inside the docstring
        let source = concat!(
            "'''don't call input(\"fake\") here'''\n",
            "x = input(\"Real:\")\n",
        );
        let prompts = scan_input_calls(source, "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "Real:");
    }

    #[test]
    fn triple_quoted_prompt_argument_is_stripped() {
        let prompts = scan_input_calls("x = input(\"\"\"Big prompt:\"\"\")\n", "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "Big prompt:");
    }

    #[test]
    fn empty_string_literals_are_not_triple_openers() {
        let source = "a = ''\nb = input('After empty:')\n";
        let prompts = scan_input_calls(source, "input");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "After empty:");
    }

    #[test]
    fn rewrite_substitutes_in_order() {
        let source = "a = input(\"A:\")\nb = input(\"B:\")\nc = input(\"C:\")\nprint(a, b, c)\n";
        let prompts = scan_input_calls(source, "input");
        let values = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let rewritten = rewrite_with_values(source, &prompts, &values);
        assert_eq!(
            rewritten,
            "a = \"1\"\nb = \"2\"\nc = \"3\"\nprint(a, b, c)\n"
        );
        // the rewritten program has no call sites left
        assert!(scan_input_calls(&rewritten, "input").is_empty());
    }

    #[test]
    fn values_containing_the_pattern_are_not_rescanned() {
        let source = "a = input(\"A:\")\n";
        let prompts = scan_input_calls(source, "input");
        let values = vec!["input(\"sneaky\")".to_string()];
        let rewritten = rewrite_with_values(source, &prompts, &values);
        assert_eq!(rewritten, "a = \"input(\\\"sneaky\\\")\"\n");
        assert!(scan_input_calls(&rewritten, "input").is_empty());
    }

    #[test]
    fn encoded_literals_survive_special_characters() {
        let source = "a = input()\n";
        let prompts = scan_input_calls(source, "input");
        let values = vec!["line one\nline \"two\"\\".to_string()];
        let rewritten = rewrite_with_values(source, &prompts, &values);
        assert_eq!(rewritten, "a = \"line one\\nline \\\"two\\\"\\\\\"\n");
        assert!(scan_input_calls(&rewritten, "input").is_empty());
    }

    #[tokio::test]
    async fn pipeline_collects_sequentially_and_rewrites() {
        let mut source_values = StaticInputSource::new(["Ada", "Lovelace"]);
        let source = "first = input(\"First name:\")\nlast = input(\"Last name:\")\n";
        let rewritten = preprocess_source(python(), source, &mut source_values)
            .await
            .unwrap();
        assert_eq!(rewritten, "first = \"Ada\"\nlast = \"Lovelace\"\n");
    }

    #[tokio::test]
    async fn pipeline_is_a_no_op_without_calls() {
        let mut source_values = StaticInputSource::new(Vec::<String>::new());
        let source = "print('nothing to collect')\n";
        let rewritten = preprocess_source(python(), source, &mut source_values)
            .await
            .unwrap();
        assert_eq!(rewritten, source);
    }

    #[tokio::test]
    async fn pipeline_ignores_languages_without_input_call() {
        let javascript = LanguageId::JavaScript.info();
        let mut source_values = StaticInputSource::new(["unused"]);
        let source = "console.log(input('not python'))\n";
        let rewritten = preprocess_source(javascript, source, &mut source_values)
            .await
            .unwrap();
        assert_eq!(rewritten, source);
    }

    #[tokio::test]
    async fn exhausted_static_source_yields_empty_strings() {
        let mut source_values = StaticInputSource::new(["only one"]);
        let source = "a = input()\nb = input()\n";
        let rewritten = preprocess_source(python(), source, &mut source_values)
            .await
            .unwrap();
        assert_eq!(rewritten, "a = \"only one\"\nb = \"\"\n");
    }
}
