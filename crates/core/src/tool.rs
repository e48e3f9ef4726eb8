//! Tool dispatch contract — the abstraction over agent capabilities.
//!
//! Tools are what let the agent act in the world: browse the web, run a
//! script, speak, manage a calendar. Each capability is identified by a
//! [`ToolKind`] tag and implemented by a [`ToolHandler`] registered in the
//! [`ToolRegistry`] — a dispatch table rather than a branching chain, so each
//! mapping can be unit-tested in isolation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::reply::ToolCall;

/// Tag identifying a dispatchable tool variant.
///
/// Serialized forms match the model-facing schema (`browsing`,
/// `pythonExecution`, `createEvent`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    Browsing,
    PythonExecution,
    VoiceMessageGeneration,
    Attachments,
    GetEvent,
    SearchEvent,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    FindFreeSlot,
    DailySummary,
}

impl ToolKind {
    /// All dispatchable kinds, in schema order.
    pub const ALL: [ToolKind; 11] = [
        ToolKind::Browsing,
        ToolKind::PythonExecution,
        ToolKind::VoiceMessageGeneration,
        ToolKind::Attachments,
        ToolKind::GetEvent,
        ToolKind::SearchEvent,
        ToolKind::CreateEvent,
        ToolKind::UpdateEvent,
        ToolKind::DeleteEvent,
        ToolKind::FindFreeSlot,
        ToolKind::DailySummary,
    ];

    /// The wire tag for this kind (same string the model emits in `type`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Browsing => "browsing",
            ToolKind::PythonExecution => "pythonExecution",
            ToolKind::VoiceMessageGeneration => "voiceMessageGeneration",
            ToolKind::Attachments => "attachments",
            ToolKind::GetEvent => "getEvent",
            ToolKind::SearchEvent => "searchEvent",
            ToolKind::CreateEvent => "createEvent",
            ToolKind::UpdateEvent => "updateEvent",
            ToolKind::DeleteEvent => "deleteEvent",
            ToolKind::FindFreeSlot => "findFreeSlot",
            ToolKind::DailySummary => "dailySummary",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of tool variants the model may propose on the next turn.
///
/// Computed by the schema gate from usage counters: an empty available set
/// constrains the output to "no tool", a singleton fixes the single variant,
/// anything else is an open union over the available tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolSchema {
    /// The `tool` field must be null.
    NoTool,
    /// Exactly one variant remains available.
    Fixed { tool: ToolKind },
    /// Open tagged union over the listed variants.
    OneOf { tools: Vec<ToolKind> },
}

impl ToolSchema {
    /// Build the schema for an available set, applying the empty/singleton
    /// collapse rules.
    pub fn from_available(mut tools: Vec<ToolKind>) -> Self {
        match tools.len() {
            0 => ToolSchema::NoTool,
            1 => ToolSchema::Fixed { tool: tools.remove(0) },
            _ => ToolSchema::OneOf { tools },
        }
    }

    /// Whether the given kind may legally appear under this schema.
    pub fn allows(&self, kind: ToolKind) -> bool {
        match self {
            ToolSchema::NoTool => false,
            ToolSchema::Fixed { tool } => *tool == kind,
            ToolSchema::OneOf { tools } => tools.contains(&kind),
        }
    }

    /// Render the constraint as a short instruction fragment for the model.
    pub fn describe(&self) -> String {
        match self {
            ToolSchema::NoTool => "The `tool` field must be null this turn.".into(),
            ToolSchema::Fixed { tool } => {
                format!("The only tool available this turn is `{tool}`; otherwise set `tool` to null.")
            }
            ToolSchema::OneOf { tools } => {
                let names: Vec<&str> = tools.iter().map(|t| t.as_str()).collect();
                format!("Available tools this turn: {}.", names.join(", "))
            }
        }
    }
}

/// What a tool call produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human/model-readable result text.
    pub text: String,

    /// Files produced by the tool (voice clips, staged attachments) that
    /// should ride along with the pending reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ToolOutput {
    /// A text-only output.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), attachments: Vec::new() }
    }
}

/// The core tool collaborator trait.
///
/// Each handler owns exactly one [`ToolKind`] and receives the full decoded
/// [`ToolCall`]; a handler passed a foreign variant returns
/// [`ToolError::InvalidArguments`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The kind this handler executes.
    fn kind(&self) -> ToolKind;

    /// Execute the call. Errors must be catchable and convertible to text —
    /// the dispatcher turns them into tool-role turns, never panics.
    async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolOutput, ToolError>;
}

/// A registry of tool handlers — the dispatch table.
pub struct ToolRegistry {
    handlers: HashMap<ToolKind, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register a handler. Replaces any existing handler for the same kind.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Look up the handler for a kind.
    pub fn get(&self, kind: ToolKind) -> Option<&dyn ToolHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }

    /// Execute a decoded tool call through its registered handler.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolOutput, ToolError> {
        let kind = call.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| ToolError::NotFound(kind.to_string()))?;
        handler.execute(call).await
    }

    /// All registered kinds.
    pub fn kinds(&self) -> Vec<ToolKind> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A handler that echoes the browsing query, for registry tests.
    struct EchoBrowse;

    #[async_trait]
    impl ToolHandler for EchoBrowse {
        fn kind(&self) -> ToolKind {
            ToolKind::Browsing
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
            match call {
                ToolCall::Browsing { query, .. } => Ok(ToolOutput::text(query.clone())),
                other => Err(ToolError::InvalidArguments(format!(
                    "expected browsing, got {}",
                    other.kind()
                ))),
            }
        }
    }

    #[test]
    fn kind_wire_tags() {
        assert_eq!(ToolKind::PythonExecution.as_str(), "pythonExecution");
        assert_eq!(
            serde_json::to_string(&ToolKind::VoiceMessageGeneration).unwrap(),
            "\"voiceMessageGeneration\""
        );
    }

    #[test]
    fn schema_collapse_rules() {
        assert_eq!(ToolSchema::from_available(vec![]), ToolSchema::NoTool);
        assert_eq!(
            ToolSchema::from_available(vec![ToolKind::Browsing]),
            ToolSchema::Fixed { tool: ToolKind::Browsing }
        );
        let open = ToolSchema::from_available(vec![ToolKind::Browsing, ToolKind::GetEvent]);
        assert!(open.allows(ToolKind::GetEvent));
        assert!(!open.allows(ToolKind::DailySummary));
    }

    #[test]
    fn schema_describe_mentions_tools() {
        let schema = ToolSchema::from_available(vec![ToolKind::Browsing, ToolKind::CreateEvent]);
        let text = schema.describe();
        assert!(text.contains("browsing"));
        assert!(text.contains("createEvent"));
    }

    #[tokio::test]
    async fn registry_dispatches_to_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoBrowse));

        let call = ToolCall::Browsing {
            query: "weather in Paris".into(),
            mode: crate::reply::BrowseMode::Web,
        };
        let out = registry.execute(&call).await.unwrap();
        assert_eq!(out.text, "weather in Paris");
    }

    #[tokio::test]
    async fn registry_missing_handler() {
        let registry = ToolRegistry::new();
        let call = ToolCall::DeleteEvent { event_id: "abc".into() };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
