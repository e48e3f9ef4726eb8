//! ToolDispatcher — one collaborator call, one tool-role turn.
//!
//! A pure mapping with no retry logic of its own: the decoded call goes to
//! its registered handler, and whatever comes back — result or error — is
//! converted into a tool-role turn. The usage counter is incremented exactly
//! once, after the call returns; a crash mid-call never consumes a single
//! use.

use confab_core::reply::ToolCall;
use confab_core::state::ToolUsage;
use confab_core::tool::ToolRegistry;
use confab_core::turn::Turn;
use tracing::{debug, warn};

/// The outcome of dispatching one tool call.
#[derive(Debug)]
pub struct DispatchResult {
    /// The tool-role turn describing the result (or the error).
    pub turn: Turn,

    /// Files the tool produced for the pending reply.
    pub attachments: Vec<String>,

    /// Whether the collaborator call succeeded.
    pub ok: bool,
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Execute the call and fold its result into a tool-role turn.
    ///
    /// Collaborator errors are captured and described in the turn, never
    /// raised — a single tool failure must not abort the conversation.
    pub async fn dispatch(&self, call: &ToolCall, usage: &mut ToolUsage) -> DispatchResult {
        let kind = call.kind();
        debug!(tool = %kind, "Dispatching tool call");

        let result = match self.registry.execute(call).await {
            Ok(output) => DispatchResult {
                turn: Turn::tool(format!("[{kind}] {}", output.text)),
                attachments: output.attachments,
                ok: true,
            },
            Err(e) => {
                warn!(tool = %kind, error = %e, "Tool execution failed");
                DispatchResult {
                    turn: Turn::tool(format!("[{kind}] Error: {e}")),
                    attachments: Vec::new(),
                    ok: false,
                }
            }
        };

        // After the call, success or graceful error — never before.
        usage.record(kind);
        result
    }
}
