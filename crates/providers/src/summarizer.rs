//! Summarizer adapter — drives a ChatModel non-streaming to digest turns.

use std::sync::Arc;

use async_trait::async_trait;
use confab_core::error::MemoryError;
use confab_core::provider::{ChatMessage, ChatModel, ChatRequest, Summarizer};
use confab_core::tool::ToolSchema;
use confab_core::turn::Role;

const DIGEST_INSTRUCTION: &str = "Condense the following conversation excerpt into a short \
    third-person digest. Keep names, decisions, and open questions; drop filler.";

/// Adapts any [`ChatModel`] into the [`Summarizer`] collaborator.
pub struct LlmSummarizer {
    model: Arc<dyn ChatModel>,
    model_name: String,
}

impl LlmSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        Self { model, model_name: model_name.into() }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, serialized_turns: &str) -> Result<String, MemoryError> {
        let request = ChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: DIGEST_INSTRUCTION.into(),
                    images: vec![],
                },
                ChatMessage {
                    role: Role::User,
                    content: serialized_turns.to_string(),
                    images: vec![],
                },
            ],
            temperature: 0.3,
            tool_schema: ToolSchema::NoTool,
        };

        self.model
            .complete(request)
            .await
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))
    }
}
