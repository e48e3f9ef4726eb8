//! File-backed fact store — persistent JSONL storage of learned facts.
//!
//! Each line is a JSON-encoded [`Fact`]. Entries are loaded into memory on
//! creation and flushed to disk on every write, giving fast reads with
//! durable writes. Human-inspectable, zero external dependencies.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use confab_core::error::MemoryError;
use confab_core::memory::{Fact, FactSink};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// A JSONL-backed implementation of the memory-write collaborator.
pub struct FactStore {
    path: PathBuf,
    facts: Arc<RwLock<Vec<Fact>>>,
}

impl FactStore {
    /// Create a store at the given path, loading existing entries if the
    /// file exists.
    pub fn new(path: PathBuf) -> Self {
        let facts = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = facts.len(), "Fact store loaded");
        Self { path, facts: Arc::new(RwLock::new(facts)) }
    }

    fn load_from_disk(path: &PathBuf) -> Vec<Fact> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet — start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Fact>(line) {
                Ok(fact) => Some(fact),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted fact entry");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self) -> Result<(), MemoryError> {
        let facts = self.facts.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::Storage(format!("Failed to create fact directory: {e}")))?;
        }

        let mut content = String::new();
        for fact in facts.iter() {
            let line = serde_json::to_string(fact)
                .map_err(|e| MemoryError::Storage(format!("Failed to serialize fact: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write fact file: {e}")))
    }

    pub async fn count(&self) -> usize {
        self.facts.read().await.len()
    }
}

#[async_trait]
impl FactSink for FactStore {
    async fn record_fact(&self, content: &str) -> Result<(), MemoryError> {
        let fact = Fact {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            recorded_at: Utc::now(),
        };
        self.facts.write().await.push(fact);
        self.flush().await
    }

    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<Fact>, MemoryError> {
        let facts = self.facts.read().await;
        let query_lower = query.to_lowercase();

        // Keyword relevance: occurrence count of any query word.
        let words: Vec<&str> = query_lower.split_whitespace().collect();
        let mut scored: Vec<(usize, &Fact)> = facts
            .iter()
            .filter_map(|f| {
                let content = f.content.to_lowercase();
                let score: usize = words.iter().map(|w| content.matches(w).count()).sum();
                (score > 0).then_some((score, f))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, f)| f.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_path() -> PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        path
    }

    #[tokio::test]
    async fn record_and_reload_persists() {
        let path = temp_path();

        let store = FactStore::new(path.clone());
        store.record_fact("User dislikes dark humor.").await.unwrap();
        assert_eq!(store.count().await, 1);

        let reloaded = FactStore::new(path);
        assert_eq!(reloaded.count().await, 1);
        let facts = reloaded.recall("humor", 5).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert!(facts[0].content.contains("dark humor"));
    }

    #[tokio::test]
    async fn recall_ranks_by_relevance() {
        let store = FactStore::new(temp_path());
        store.record_fact("User likes tea.").await.unwrap();
        store.record_fact("User likes green tea and tea ceremonies.").await.unwrap();
        store.record_fact("User owns a bicycle.").await.unwrap();

        let facts = store.recall("tea", 2).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert!(facts[0].content.contains("ceremonies"));
    }

    #[tokio::test]
    async fn recall_without_match_is_empty() {
        let store = FactStore::new(temp_path());
        store.record_fact("User likes tea.").await.unwrap();
        assert!(store.recall("astronomy", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"1","content":"valid fact","recorded_at":"2026-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(tmp, "this is not json").unwrap();
        let path = tmp.path().to_path_buf();

        let store = FactStore::new(path);
        assert_eq!(store.count().await, 1);
    }
}
