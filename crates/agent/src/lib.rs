//! The Confab generation loop — the heart of the runtime.
//!
//! One generation turn follows this cycle:
//!
//! 1. **Bound** the transcript (threshold-triggered summarization)
//! 2. **Gate** the tool schema from lifetime usage counters
//! 3. **Stream** the model's JSON reply, surfacing fields as they close
//! 4. **Dispatch** at most one tool mid-stream — blocking for feedback
//!    tools, inline for fire-and-forget ones
//! 5. **Finalize** the reply record: normalization, transcript bookkeeping,
//!    fact forwarding
//!
//! A feedback-required tool cancels the rest of the stream and hands control
//! back to the caller for a follow-up turn with the tool result folded into
//! the transcript.

pub mod dispatch;
pub mod extract;
pub mod loop_runner;
pub mod schema;

pub use dispatch::{DispatchResult, ToolDispatcher};
pub use extract::{Field, StreamExtractor};
pub use loop_runner::{AgentLoop, TurnOutcome};
pub use schema::SchemaGate;
