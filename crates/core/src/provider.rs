//! ChatModel trait — the abstraction over the streaming LLM collaborator.
//!
//! A ChatModel knows how to send an ordered message list to an LLM endpoint
//! and return either a complete text or an incremental sequence of UTF-8
//! chunks of a single JSON object. No chunk boundary is guaranteed to align
//! with JSON token boundaries — reassembly belongs to the stream extractor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, ProviderError};
use crate::tool::ToolSchema;
use crate::turn::{Role, Turn};

/// One outbound message: role, text, and any image references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Local paths of images to inline with the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            images: turn.attachments.clone(),
        }
    }
}

/// A request for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g. "mistral-large-latest").
    pub model: String,

    /// The ordered message list: system turn first, then the transcript.
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// The tool variants the model may propose this turn.
    pub tool_schema: ToolSchema,
}

fn default_temperature() -> f32 {
    0.7
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial UTF-8 text of the JSON object being generated.
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the explicit end-of-stream marker.
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    /// A content-bearing chunk.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), done: false }
    }

    /// The end-of-stream marker.
    pub fn done() -> Self {
        Self { content: None, done: true }
    }
}

/// The chat-stream collaborator.
///
/// The agent loop calls `stream()` and consumes chunks in delivery order;
/// `complete()` backs non-streaming uses such as summarization.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// A human-readable name for this backend (e.g. "mistral").
    fn name(&self) -> &str;

    /// Send a request and get the complete response text.
    async fn complete(&self, request: ChatRequest) -> std::result::Result<String, ProviderError>;

    /// Send a request and get a stream of response chunks, terminated by a
    /// chunk with `done = true`.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// single chunk followed by the end marker.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let text = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(text))).await;
        let _ = tx.send(Ok(StreamChunk::done())).await;
        Ok(rx)
    }
}

/// The summarizer collaborator: collapses serialized turns into a digest.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, serialized_turns: &str) -> std::result::Result<String, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolKind;

    struct FixedModel;

    #[async_trait]
    impl ChatModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<String, ProviderError> {
            Ok("{\"reply\":null}".into())
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage { role: Role::System, content: "sys".into(), images: vec![] }],
            temperature: default_temperature(),
            tool_schema: ToolSchema::Fixed { tool: ToolKind::Browsing },
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let model = FixedModel;
        let mut rx = model.stream(request()).await.unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("{\"reply\":null}"));
        assert!(!first.done);

        let last = rx.recv().await.unwrap().unwrap();
        assert!(last.done);
    }

    #[test]
    fn chat_message_from_turn_carries_attachments() {
        let turn = Turn::user_with_attachments("look", vec!["download/a.png".into()]);
        let msg = ChatMessage::from(&turn);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.images, vec!["download/a.png".to_string()]);
    }
}
