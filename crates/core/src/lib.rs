//! # Confab Core
//!
//! Domain types, traits, and error definitions for the Confab conversational
//! agent runtime. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (chat model, tool, summarizer, fact sink) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod memory;
pub mod provider;
pub mod reply;
pub mod state;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{ContractError, Error, MemoryError, ProviderError, Result, ToolError};
pub use memory::FactSink;
pub use provider::{ChatMessage, ChatModel, ChatRequest, StreamChunk, Summarizer};
pub use reply::{BrowseMode, ReplyState, StructuredReply, ToolCall, UserRead};
pub use state::{AgentState, ToolUsage};
pub use tool::{ToolHandler, ToolKind, ToolOutput, ToolRegistry, ToolSchema};
pub use turn::{Role, Turn};
