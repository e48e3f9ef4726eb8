//! Transcript store — the ordered conversation log and its bounding policy.
//!
//! The store owns the single source of conversational truth: an ordered
//! sequence of turns, always beginning with exactly one system turn. Growth
//! is bounded by [`SummarizationPolicy`], which collapses the oldest turns
//! into one synthetic digest turn once a threshold is crossed.
//!
//! A JSON mirror of the transcript (turns plus the running summary) is
//! rewritten in full after every mutation. Attachment references are redacted
//! to a marker in the persisted form; persistence failures are logged and
//! never fail the mutation.

use std::path::PathBuf;
use std::sync::Arc;

use confab_core::error::MemoryError;
use confab_core::provider::Summarizer;
use confab_core::turn::{Role, Turn};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const ATTACHMENT_REDACTED: &str = "[attachment redacted]";

struct Inner {
    turns: Vec<Turn>,
    summary: Option<String>,
}

/// The ordered message log plus per-conversation metadata.
///
/// Single-writer discipline: mutation happens under the write lock, so any
/// concurrent reader sees either the pre- or post-mutation transcript, never
/// a half-update.
pub struct TranscriptStore {
    inner: Arc<RwLock<Inner>>,
    path: Option<PathBuf>,
}

impl TranscriptStore {
    /// Create a store seeded with the system turn. If `path` is given, the
    /// JSON mirror is rewritten there after every mutation.
    pub fn new(system_prompt: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                turns: vec![Turn::system(system_prompt)],
                summary: None,
            })),
            path,
        }
    }

    /// Append a turn to the end. Always legal.
    pub async fn append(&self, turn: Turn) {
        let mut inner = self.inner.write().await;
        inner.turns.push(turn);
        self.persist(&inner);
    }

    /// Clone of the ordered turns.
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.inner.read().await.turns.clone()
    }

    /// Current transcript length, system turn included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.turns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Persist the running conversation summary proposed by the model.
    pub async fn set_summary(&self, summary: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.summary = Some(summary.into());
        self.persist(&inner);
    }

    pub async fn summary(&self) -> Option<String> {
        self.inner.read().await.summary.clone()
    }

    /// Atomically replace the `digest_len` turns following the system turn
    /// with the given digest turn. The swap only happens if the prefix is
    /// still long enough; the tail is preserved verbatim and in order.
    async fn replace_prefix(&self, digest: Turn, digest_len: usize) {
        let mut inner = self.inner.write().await;
        if inner.turns.len() <= 1 + digest_len {
            warn!("Transcript shrank during summarization, skipping digest swap");
            return;
        }
        inner.turns.splice(1..1 + digest_len, [digest]);
        self.persist(&inner);
    }

    /// Rewrite the JSON mirror. Attachment paths are replaced by a redaction
    /// marker; failures are logged, never raised.
    fn persist(&self, inner: &Inner) {
        let Some(path) = &self.path else { return };

        #[derive(Serialize)]
        struct Mirror<'a> {
            summary: &'a Option<String>,
            turns: Vec<Turn>,
        }

        let turns = inner
            .turns
            .iter()
            .map(|t| {
                let mut t = t.clone();
                for a in &mut t.attachments {
                    *a = ATTACHMENT_REDACTED.into();
                }
                t
            })
            .collect();

        let mirror = Mirror { summary: &inner.summary, turns };

        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&mirror)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, json)
        })();

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to persist transcript mirror");
        }
    }
}

/// Collapses the oldest turns into a single digest turn when the transcript
/// grows past a threshold.
pub struct SummarizationPolicy {
    /// Compaction fires once the transcript exceeds this many turns.
    pub threshold: usize,

    /// How many of the oldest non-system turns are collapsed per pass.
    pub digest_oldest: usize,
}

impl SummarizationPolicy {
    pub fn new(threshold: usize, digest_oldest: usize) -> Self {
        Self { threshold, digest_oldest }
    }

    /// Run one compaction pass. Returns whether a digest was applied.
    ///
    /// On summarizer failure the store is left unchanged (no partial
    /// truncation) and the error is returned for the caller to log.
    pub async fn compact(
        &self,
        store: &TranscriptStore,
        summarizer: &dyn Summarizer,
    ) -> Result<bool, MemoryError> {
        let turns = store.snapshot().await;
        if turns.len() <= self.threshold {
            return Ok(false);
        }

        // Never digest the system turn, and leave at least one live turn.
        let digest_len = self.digest_oldest.min(turns.len().saturating_sub(2));
        if digest_len == 0 {
            return Ok(false);
        }
        let to_digest = &turns[1..1 + digest_len];

        let serialized = serialize_for_digest(to_digest);
        debug!(turns = digest_len, "Summarizing transcript prefix");

        let digest_text = summarizer.summarize(&serialized).await?;
        let digest = Turn::user(format!("[Conversation so far] {digest_text}"));

        store.replace_prefix(digest, digest_len).await;
        Ok(true)
    }
}

/// Serialize turns for the summarizer, stripping attachments down to a
/// textual marker.
fn serialize_for_digest(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let role = match turn.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        out.push_str(&format!("{role}: {}", turn.content));
        if turn.has_attachments() {
            out.push_str(&format!(" [attached {} image(s)]", turn.attachments.len()));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSummarizer {
        calls: AtomicUsize,
    }

    impl FixedSummarizer {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _serialized: &str) -> Result<String, MemoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("they talked about the weather".into())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _serialized: &str) -> Result<String, MemoryError> {
            Err(MemoryError::SummarizationFailed("model unavailable".into()))
        }
    }

    async fn store_with_turns(n: usize) -> TranscriptStore {
        let store = TranscriptStore::new("You are a test assistant.", None);
        for i in 0..n {
            store.append(Turn::user(format!("message {i}"))).await;
        }
        store
    }

    #[tokio::test]
    async fn starts_with_single_system_turn() {
        let store = TranscriptStore::new("sys", None);
        let turns = store.snapshot().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::System);
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = store_with_turns(3).await;
        let turns = store.snapshot().await;
        assert_eq!(turns[1].content, "message 0");
        assert_eq!(turns[3].content, "message 2");
    }

    #[tokio::test]
    async fn compact_below_threshold_is_noop() {
        let store = store_with_turns(5).await;
        let policy = SummarizationPolicy::new(15, 10);
        let summarizer = FixedSummarizer::new();
        assert!(!policy.compact(&store, &summarizer).await.unwrap());
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 6);
    }

    #[tokio::test]
    async fn compact_replaces_prefix_and_keeps_tail() {
        // 1 system + 16 user turns = 17 > 15
        let store = store_with_turns(16).await;
        let before = store.snapshot().await;
        let tail_before: Vec<Turn> = before[11..].to_vec();

        let policy = SummarizationPolicy::new(15, 10);
        assert!(policy.compact(&store, &FixedSummarizer::new()).await.unwrap());

        let after = store.snapshot().await;
        // N=17, digest the oldest 10: 1 + (17 - 10) = 8 turns remain.
        assert_eq!(after.len(), 8);
        assert_eq!(after[0].role, Role::System);
        assert_eq!(after[1].role, Role::User);
        assert!(after[1].content.contains("they talked about the weather"));

        // Tail preserved verbatim and in order.
        assert_eq!(&after[2..], tail_before.as_slice());
    }

    #[tokio::test]
    async fn compact_failure_leaves_store_unchanged() {
        let store = store_with_turns(16).await;
        let before = store.snapshot().await;

        let policy = SummarizationPolicy::new(15, 10);
        let err = policy.compact(&store, &FailingSummarizer).await;
        assert!(err.is_err());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn digest_input_carries_attachment_markers() {
        let turns = vec![
            Turn::user("look at these"),
            Turn::user_with_attachments("photos", vec!["a.png".into(), "b.png".into()]),
        ];
        let serialized = serialize_for_digest(&turns);
        assert!(serialized.contains("[attached 2 image(s)]"));
        // Paths themselves never reach the summarizer.
        assert!(!serialized.contains("a.png"));
    }

    #[tokio::test]
    async fn mirror_written_and_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        let store = TranscriptStore::new("sys", Some(path.clone()));
        store
            .append(Turn::user_with_attachments("photo", vec!["download/cat.png".into()]))
            .await;
        store.set_summary("a short chat").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("photo"));
        assert!(content.contains("a short chat"));
        assert!(content.contains("[attachment redacted]"));
        assert!(!content.contains("cat.png"));
    }

    #[tokio::test]
    async fn summary_roundtrip() {
        let store = TranscriptStore::new("sys", None);
        assert!(store.summary().await.is_none());
        store.set_summary("running summary").await;
        assert_eq!(store.summary().await.as_deref(), Some("running summary"));
    }
}
