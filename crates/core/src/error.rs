//! Error types for the Confab domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Confab operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Output contract violations ---
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    /// The stream ended without ever completing a `reply` field and without a
    /// feedback tool having been dispatched. Retryable: the transcript is not
    /// rolled back, so a retry continues from the same point.
    #[error("Generation produced no reply (retryable)")]
    EmptyGeneration,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller may retry the whole generation turn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::EmptyGeneration | Error::Contract(_))
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No handler registered for tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool not currently available: {0}")]
    NotAvailable(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Violations of the decoded-reply contract that normalization cannot fix.
#[derive(Debug, Clone, Error)]
pub enum ContractError {
    #[error("non-empty reply addressed to no target user")]
    MissingTarget,
}
