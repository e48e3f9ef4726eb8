//! Context and memory management for Confab.
//!
//! Two stores live here: the [`TranscriptStore`] holding the ordered
//! conversation log with its threshold-triggered [`SummarizationPolicy`],
//! and the [`FactStore`] holding long-term facts learned about users.

pub mod facts;
pub mod transcript;

pub use facts::FactStore;
pub use transcript::{SummarizationPolicy, TranscriptStore};
