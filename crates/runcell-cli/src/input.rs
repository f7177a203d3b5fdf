//! Terminal prompt collection.
//!
//! Bridges the core's `InputSource` collaborator to interactive
//! dialoguer prompts: one prompt per blocking-read call site, asked in
//! source order.

use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Input};
use runcell_core::errors::InputError;
use runcell_core::preprocess::{InputPrompt, InputSource};

#[derive(Default)]
pub struct TerminalInputSource;

impl TerminalInputSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InputSource for TerminalInputSource {
    async fn collect(&mut self, prompt: &InputPrompt, _index: usize) -> Result<String, InputError> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt.prompt_text.clone())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| InputError::Aborted(e.to_string()))
    }
}
