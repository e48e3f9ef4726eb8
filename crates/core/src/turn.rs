//! Turn — the single message unit of a conversation transcript.
//!
//! These are the core value objects that flow through the entire system:
//! a user writes → a Turn is appended → the agent generates → its reply
//! becomes another Turn. Insertion order is the sole source of
//! conversational truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single turn in a conversation transcript.
///
/// Immutable once appended, except when a summarized prefix is replaced by a
/// digest turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who sent this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Ordered image/file references attached to this turn (local paths)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a user turn carrying image attachments.
    pub fn user_with_attachments(content: impl Into<String>, attachments: Vec<String>) -> Self {
        let mut turn = Self::new(Role::User, content);
        turn.attachments = attachments;
        turn
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool-result turn.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Whether this turn carries any attachments.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello, agent!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Hello, agent!");
        assert!(!turn.has_attachments());
    }

    #[test]
    fn user_turn_with_attachments() {
        let turn = Turn::user_with_attachments("see photo", vec!["download/cat.png".into()]);
        assert!(turn.has_attachments());
        assert_eq!(turn.attachments.len(), 1);
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::tool("result text");
        let json = serde_json::to_string(&turn).unwrap();
        let deserialized: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "result text");
        assert_eq!(deserialized.role, Role::Tool);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }
}
