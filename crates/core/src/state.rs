//! Agent lifecycle state and tool-usage accounting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tool::ToolKind;

/// Per-lifetime invocation counts, keyed by tool kind.
///
/// Mutated only by the dispatcher, after a call completes; read by the schema
/// gate to decide which variants remain available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    counts: HashMap<ToolKind, u32>,
}

impl ToolUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed invocation.
    pub fn record(&mut self, kind: ToolKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    /// How many times the kind has been invoked this lifetime.
    pub fn count(&self, kind: ToolKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Runtime lifecycle flags for the agent, plus nested usage counters.
///
/// The flags reset at the start of every generation turn; `tool_usage` spans
/// the agent lifetime. The caller reads `done` to know when the finalized
/// reply is safe to consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// A generation turn is consuming the stream.
    pub thinking: bool,

    /// A user-directed reply is being composed.
    pub replying: bool,

    /// The turn finished and the reply record is frozen.
    pub done: bool,

    /// Lifetime tool invocation counts.
    pub tool_usage: ToolUsage,
}

impl AgentState {
    /// Reset the lifecycle flags for a fresh turn. Counters are preserved —
    /// they gate single-use tools across turns.
    pub fn begin_turn(&mut self) {
        self.thinking = true;
        self.replying = false;
        self.done = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counts_accumulate() {
        let mut usage = ToolUsage::new();
        assert_eq!(usage.count(ToolKind::VoiceMessageGeneration), 0);
        usage.record(ToolKind::VoiceMessageGeneration);
        usage.record(ToolKind::Browsing);
        usage.record(ToolKind::Browsing);
        assert_eq!(usage.count(ToolKind::VoiceMessageGeneration), 1);
        assert_eq!(usage.count(ToolKind::Browsing), 2);
    }

    #[test]
    fn begin_turn_resets_flags_not_counters() {
        let mut state = AgentState::default();
        state.done = true;
        state.replying = true;
        state.tool_usage.record(ToolKind::Attachments);

        state.begin_turn();
        assert!(state.thinking);
        assert!(!state.replying);
        assert!(!state.done);
        assert_eq!(state.tool_usage.count(ToolKind::Attachments), 1);
    }

    #[test]
    fn usage_serializes_with_string_keys() {
        let mut usage = ToolUsage::new();
        usage.record(ToolKind::CreateEvent);
        let json = serde_json::to_string(&usage).unwrap();
        assert!(json.contains("createEvent"));
    }
}
