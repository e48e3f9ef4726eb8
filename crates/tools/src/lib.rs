//! Tool collaborator implementations for Confab.
//!
//! Tools give the agent the ability to act in the world: browse the web,
//! find videos and GIFs, run scripts, speak, stage attachments, and manage
//! a calendar. Each handler implements `confab_core::ToolHandler` and is
//! registered in the dispatch table.

pub mod attachments;
pub mod browsing;
pub mod calendar;
pub mod script;
pub mod voice;

use std::sync::Arc;

use confab_config::AppConfig;
use confab_core::tool::ToolRegistry;

pub use attachments::AttachmentsTool;
pub use browsing::BrowsingTool;
pub use calendar::{CalendarStore, CalendarTool};
pub use script::ScriptTool;
pub use voice::VoiceTool;

/// Build a registry with every built-in tool, wired from configuration.
pub fn registry_from_config(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(BrowsingTool::new(config.tools.giphy_api_key.clone())));
    registry.register(Box::new(ScriptTool::new(
        config.tools.script_interpreter.clone(),
        config.tools.script_timeout_secs,
        config.tools.script_max_output,
    )));
    registry.register(Box::new(VoiceTool::new(
        config.tools.tts_api_key.clone(),
        config.tools.tts_voice_id.clone(),
        config.download_path.clone(),
    )));
    registry.register(Box::new(AttachmentsTool::new()));

    let calendar = Arc::new(CalendarStore::new(
        config.tools.calendar_path.clone(),
        config.tools.work_start,
        config.tools.work_end,
    ));
    for tool in CalendarTool::suite(calendar) {
        registry.register(Box::new(tool));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::tool::ToolKind;

    #[test]
    fn registry_covers_every_kind() {
        let config = AppConfig::default();
        let registry = registry_from_config(&config);
        for kind in ToolKind::ALL {
            assert!(registry.get(kind).is_some(), "missing handler for {kind}");
        }
    }
}
