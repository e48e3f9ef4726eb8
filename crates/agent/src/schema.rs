//! SchemaGate — computes which tool variants the model may propose.
//!
//! A tool is available iff it is uncapped (the default) or its lifetime
//! usage counter is still zero. The gate's output shape mirrors what the
//! server can still satisfy: an empty set constrains the schema to "no
//! tool", a singleton fixes that variant, anything else stays an open
//! tagged union.

use std::collections::HashSet;

use confab_core::state::ToolUsage;
use confab_core::tool::{ToolKind, ToolSchema};

pub struct SchemaGate {
    single_use: HashSet<ToolKind>,
}

impl SchemaGate {
    /// Gate with the given single-use kinds; everything else is uncapped.
    pub fn new(single_use: impl IntoIterator<Item = ToolKind>) -> Self {
        Self { single_use: single_use.into_iter().collect() }
    }

    /// The tool kinds currently available, in schema order.
    pub fn available_tools(&self, usage: &ToolUsage) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| !self.single_use.contains(kind) || usage.count(*kind) == 0)
            .collect()
    }

    /// The tool schema for the next generation turn.
    pub fn schema_for(&self, usage: &ToolUsage) -> ToolSchema {
        ToolSchema::from_available(self.available_tools(usage))
    }
}

impl Default for SchemaGate {
    fn default() -> Self {
        Self::new([ToolKind::VoiceMessageGeneration])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_tools_stay_available() {
        let gate = SchemaGate::default();
        let mut usage = ToolUsage::new();
        usage.record(ToolKind::Browsing);
        usage.record(ToolKind::Browsing);
        usage.record(ToolKind::CreateEvent);

        let available = gate.available_tools(&usage);
        assert!(available.contains(&ToolKind::Browsing));
        assert!(available.contains(&ToolKind::CreateEvent));
    }

    #[test]
    fn single_use_tool_excluded_after_one_dispatch() {
        let gate = SchemaGate::default();
        let mut usage = ToolUsage::new();

        assert!(gate.available_tools(&usage).contains(&ToolKind::VoiceMessageGeneration));

        usage.record(ToolKind::VoiceMessageGeneration);
        let available = gate.available_tools(&usage);
        assert!(!available.contains(&ToolKind::VoiceMessageGeneration));
        // Only the capped tool dropped out.
        assert_eq!(available.len(), ToolKind::ALL.len() - 1);
    }

    #[test]
    fn schema_collapses_to_fixed_then_none() {
        let gate = SchemaGate::new(ToolKind::ALL);
        let mut usage = ToolUsage::new();
        for kind in ToolKind::ALL.into_iter().skip(1) {
            usage.record(kind);
        }

        // One tool left: the schema pins it.
        assert_eq!(
            gate.schema_for(&usage),
            ToolSchema::Fixed { tool: ToolKind::Browsing }
        );

        usage.record(ToolKind::Browsing);
        assert_eq!(gate.schema_for(&usage), ToolSchema::NoTool);
    }

    #[test]
    fn open_union_over_remaining_tools() {
        let gate = SchemaGate::default();
        let usage = ToolUsage::new();
        match gate.schema_for(&usage) {
            ToolSchema::OneOf { tools } => assert_eq!(tools.len(), ToolKind::ALL.len()),
            other => panic!("expected open union, got {other:?}"),
        }
    }
}
