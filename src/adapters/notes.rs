//! Notes generation with a text LLM.

use crate::adapters::llm::{chat_with_retry, completion_options, RetryPolicy};
use crate::adapters::postprocess;
use crate::collaborators::NotesGenerator;
use crate::config::WorkflowConfig;
use crate::error::StageError;
use crate::prompts::{notes_request, NOTES_SYSTEM_PROMPT};
use crate::store::RichContent;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::sync::Arc;
use tracing::info;

/// [`NotesGenerator`] that asks an LLM for an HTML study-notes fragment.
pub struct LlmNotesGenerator {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    retry: RetryPolicy,
}

impl LlmNotesGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &WorkflowConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .notes_system_prompt
                .clone()
                .unwrap_or_else(|| NOTES_SYSTEM_PROMPT.to_string()),
            temperature: config.notes_temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::from_config(config),
        }
    }
}

#[async_trait]
impl NotesGenerator for LlmNotesGenerator {
    async fn generate_notes(&self, text: &str) -> Result<RichContent, StageError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(notes_request(text)),
        ];
        let options = completion_options(self.temperature, self.max_tokens);

        let raw = chat_with_retry(&self.provider, &messages, &options, self.retry, "Notes")
            .await
            .map_err(StageError::generation)?;

        let notes = RichContent::new(postprocess::clean_html(&raw));
        if notes.is_blank() {
            return Err(StageError::generation("model returned empty notes"));
        }
        info!("Notes ready: {} bytes", notes.as_html().len());
        Ok(notes)
    }
}
