//! Memory-write collaborator — long-term fact storage.
//!
//! When a generation turn surfaces a newly learned fact about a user, the
//! loop forwards it here fire-and-forget: a failed write is logged by the
//! caller and never fails the turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A single remembered fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique ID for this fact.
    pub id: String,

    /// The fact text (e.g. "User dislikes dark humor.").
    pub content: String,

    /// When this fact was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// The fact-sink collaborator trait.
#[async_trait]
pub trait FactSink: Send + Sync {
    /// Persist a fact. Fire-and-forget from the loop's perspective.
    async fn record_fact(&self, content: &str) -> std::result::Result<(), MemoryError>;

    /// Recall up to `limit` facts relevant to `query`, most relevant first.
    async fn recall(&self, query: &str, limit: usize)
        -> std::result::Result<Vec<Fact>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_serialization_roundtrip() {
        let fact = Fact {
            id: "f1".into(),
            content: "User prefers metric units".into(),
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string(&fact).unwrap();
        let back: Fact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "User prefers metric units");
    }
}
