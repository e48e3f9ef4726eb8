//! The decoded output contract — tool calls and the structured reply.
//!
//! The model emits a single JSON object per generation turn. `ToolCall` is
//! the tagged union its `tool` field decodes into; `StructuredReply` is the
//! full object. No type is synthesized at runtime: the union is fixed and the
//! schema gate only restricts which tags may appear.

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::tool::ToolKind;

/// Mode selector for the browsing tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowseMode {
    /// Search or fetch a page; the result must be fed back before replying.
    #[default]
    Web,
    /// Find a video URL; fed back before replying.
    Youtube,
    /// Find a GIF URL; attached to the pending reply without feedback.
    Gif,
}

/// A decoded tool proposal. Exactly one variant (or none) per generation turn.
///
/// Calendar date fields accept natural language ("today", "tomorrow") —
/// resolution happens in the calendar collaborator, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolCall {
    Browsing {
        query: String,
        #[serde(default)]
        mode: BrowseMode,
    },
    PythonExecution {
        script: String,
    },
    VoiceMessageGeneration {
        message: String,
    },
    Attachments {
        paths: Vec<String>,
    },
    GetEvent {
        #[serde(default)]
        date: Option<String>,
    },
    SearchEvent {
        query: String,
        #[serde(default)]
        days: Option<i64>,
    },
    CreateEvent {
        title: String,
        date: String,
        #[serde(default)]
        time: Option<String>,
    },
    UpdateEvent {
        event_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        time: Option<String>,
    },
    DeleteEvent {
        event_id: String,
    },
    FindFreeSlot {
        date: String,
        duration: i64,
    },
    DailySummary {
        date: String,
    },
}

impl ToolCall {
    /// The dispatch tag for this call.
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::Browsing { .. } => ToolKind::Browsing,
            ToolCall::PythonExecution { .. } => ToolKind::PythonExecution,
            ToolCall::VoiceMessageGeneration { .. } => ToolKind::VoiceMessageGeneration,
            ToolCall::Attachments { .. } => ToolKind::Attachments,
            ToolCall::GetEvent { .. } => ToolKind::GetEvent,
            ToolCall::SearchEvent { .. } => ToolKind::SearchEvent,
            ToolCall::CreateEvent { .. } => ToolKind::CreateEvent,
            ToolCall::UpdateEvent { .. } => ToolKind::UpdateEvent,
            ToolCall::DeleteEvent { .. } => ToolKind::DeleteEvent,
            ToolCall::FindFreeSlot { .. } => ToolKind::FindFreeSlot,
            ToolCall::DailySummary { .. } => ToolKind::DailySummary,
        }
    }

    /// Whether the result must be read back by the model before any
    /// user-facing reply is produced.
    ///
    /// Feedback-required: web/youtube browsing, script execution, and the
    /// whole calendar suite. Fire-and-forget: gif browsing, voice clips,
    /// attachments.
    pub fn is_feedback_required(&self) -> bool {
        match self {
            ToolCall::Browsing { mode, .. } => !matches!(mode, BrowseMode::Gif),
            ToolCall::PythonExecution { .. } => true,
            ToolCall::VoiceMessageGeneration { .. } | ToolCall::Attachments { .. } => false,
            ToolCall::GetEvent { .. }
            | ToolCall::SearchEvent { .. }
            | ToolCall::CreateEvent { .. }
            | ToolCall::UpdateEvent { .. }
            | ToolCall::DeleteEvent { .. }
            | ToolCall::FindFreeSlot { .. }
            | ToolCall::DailySummary { .. } => true,
        }
    }
}

/// Per-user state summary decoded from the model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRead {
    pub name: String,

    #[serde(default)]
    pub current_emotion: Option<String>,

    /// 0–100 estimate of how engaged the user currently is.
    #[serde(default)]
    pub engagement_level: u8,

    #[serde(default)]
    pub act_recognition: Option<String>,
}

/// The full decoded output of one generation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredReply {
    /// Read of each user present in the conversation.
    #[serde(default)]
    pub users: Vec<UserRead>,

    /// Running conversation summary proposed by the model.
    #[serde(default)]
    pub summary: Option<String>,

    /// The model's private reasoning; never delivered.
    #[serde(default)]
    pub internal_monologue: Option<String>,

    /// The proposed tool action, if any.
    #[serde(default)]
    pub tool: Option<ToolCall>,

    /// A newly learned fact about a user, forwarded to long-term memory.
    #[serde(default)]
    pub unknown_fact: Option<String>,

    /// The user-facing message. `null`/empty means intentional silence.
    #[serde(default)]
    pub reply: Option<String>,

    /// Who the reply is addressed to. Must be present iff `reply` is
    /// non-empty.
    #[serde(default)]
    pub target_user: Option<String>,

    /// Outgoing attachment paths accumulated for this reply.
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl StructuredReply {
    /// Whether the reply field is empty or absent.
    pub fn reply_is_empty(&self) -> bool {
        self.reply.as_deref().map_or(true, str::is_empty)
    }

    /// Enforce the reply/target/feedback invariant by coercion where the
    /// contract allows it, rejecting only the case normalization cannot fix.
    ///
    /// - a feedback-required tool with a non-empty reply → reply coerced
    ///   empty (the model must wait for the tool result);
    /// - an empty reply with a target → target coerced absent;
    /// - a non-empty reply with no target → [`ContractError::MissingTarget`].
    pub fn normalize(&mut self) -> std::result::Result<(), ContractError> {
        if let Some(tool) = &self.tool {
            if tool.is_feedback_required() && !self.reply_is_empty() {
                self.reply = None;
            }
        }

        if self.reply_is_empty() {
            self.target_user = None;
        } else if self.target_user.is_none() {
            return Err(ContractError::MissingTarget);
        }

        Ok(())
    }
}

/// Reply lifecycle within one generation turn.
///
/// Distinguishes "the field never completed" from "the model chose silence"
/// — the two were conflated as emptiness upstream, which made group-chat
/// silence indistinguishable from a truncated stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReplyState {
    /// The reply field has not been extracted yet.
    #[default]
    Pending,
    /// The reply field completed as null/empty: intentional silence.
    Silent,
    /// A non-empty user-facing message.
    Message { text: String },
}

impl ReplyState {
    /// Build from an extracted reply value.
    pub fn from_extracted(reply: Option<&str>) -> Self {
        match reply {
            None => ReplyState::Silent,
            Some("") => ReplyState::Silent,
            Some(text) => ReplyState::Message { text: text.to_string() },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReplyState::Pending)
    }

    /// The message text, if one was produced.
    pub fn message(&self) -> Option<&str> {
        match self {
            ReplyState::Message { text } => Some(text),
            _ => None,
        }
    }
}
