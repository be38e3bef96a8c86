//! Read-only knowledge-chunk store.
//!
//! Loaded once from the JSON file the ingestion pipeline writes, then shared
//! immutably across requests. Supports cosine-similarity search over the
//! stored embeddings and a linear keyword scan over chunk metadata. The
//! index has no native metadata pre-filtering, so filtered similarity
//! searches over-fetch and discard non-matching chunks programmatically.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::KnowledgeChunk;

/// Over-fetch factor used when a subject/lesson filter is active.
const FILTER_OVERFETCH: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    #[serde(flatten)]
    chunk: KnowledgeChunk,
    embedding: Vec<f32>,
}

/// Optional subject/lesson scoping applied to every search.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub subject: Option<String>,
    pub lesson: Option<String>,
}

impl ChunkFilter {
    pub fn is_active(&self) -> bool {
        self.subject.is_some() || self.lesson.is_some()
    }

    fn matches(&self, chunk: &KnowledgeChunk) -> bool {
        if let Some(subject) = &self.subject {
            if &chunk.subject != subject {
                return false;
            }
        }
        if let Some(lesson) = &self.lesson {
            if &chunk.lesson != lesson {
                return false;
            }
        }
        true
    }
}

pub struct ChunkStore {
    chunks: Vec<StoredChunk>,
}

impl ChunkStore {
    /// Load the store from disk. A missing file yields an empty store; the
    /// evaluate endpoint reports that as unavailable rather than failing
    /// startup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Chunk store file not found at {}", path.display());
            return Ok(Self { chunks: Vec::new() });
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chunk store at {}", path.display()))?;
        let chunks: Vec<StoredChunk> =
            serde_json::from_str(&data).context("Failed to parse chunk store")?;

        tracing::info!("Loaded {} knowledge chunks", chunks.len());
        Ok(Self { chunks })
    }

    /// Build a store directly from chunks and parallel embeddings (tests,
    /// tooling).
    pub fn from_chunks(chunks: Vec<KnowledgeChunk>, embeddings: Vec<Vec<f32>>) -> Self {
        let chunks = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk { chunk, embedding })
            .collect();
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Persist the store to disk in the ingestion format.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string(&self.chunks)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Cosine-similarity search for `k` chunks matching `filter`. When the
    /// filter is active, `k × 5` candidates are ranked first and
    /// non-matching ones discarded until `k` matches are found or the
    /// candidates run out.
    pub fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Vec<KnowledgeChunk> {
        let fetch = if filter.is_active() {
            k * FILTER_OVERFETCH
        } else {
            k
        };

        let mut scored: Vec<(f32, &StoredChunk)> = self
            .chunks
            .iter()
            .map(|c| (cosine_similarity(query_embedding, &c.embedding), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(fetch);

        let mut results = Vec::with_capacity(k);
        for (_, stored) in scored {
            if results.len() >= k {
                break;
            }
            if filter.matches(&stored.chunk) {
                results.push(stored.chunk.clone());
            }
        }
        results
    }

    /// Linear scan over stored keyword sets. A chunk matches when its
    /// keyword set intersects `keywords`, case-insensitively, and the
    /// subject/lesson filter passes. Returns at most `k` chunks in store
    /// order.
    pub fn search_keywords(
        &self,
        keywords: &[String],
        k: usize,
        filter: &ChunkFilter,
    ) -> Vec<KnowledgeChunk> {
        let wanted: std::collections::HashSet<String> =
            keywords.iter().map(|w| w.to_lowercase()).collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for stored in &self.chunks {
            if results.len() >= k {
                break;
            }
            if !filter.matches(&stored.chunk) {
                continue;
            }
            let present = stored
                .chunk
                .keywords
                .iter()
                .any(|w| wanted.contains(&w.to_lowercase()));
            if present {
                results.push(stored.chunk.clone());
            }
        }
        results
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(description: &str, subject: &str, lesson: &str, keywords: &[&str]) -> KnowledgeChunk {
        KnowledgeChunk {
            content: format!("content: {description}"),
            description: description.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            probe_questions: vec![],
            part_of: "SLIDE 1".to_string(),
            subject: subject.to_string(),
            lesson: lesson.to_string(),
            source: "test.pdf".to_string(),
            ingested_at: Utc::now(),
        }
    }

    fn store() -> ChunkStore {
        ChunkStore::from_chunks(
            vec![
                chunk("deadlock basics", "os", "l1", &["Deadlock", "mutex"]),
                chunk("paging and virtual memory", "os", "l2", &["paging", "memory"]),
                chunk("sql joins", "db", "l1", &["join", "sql"]),
            ],
            vec![
                vec![0.9, 0.1, 0.0],
                vec![0.1, 0.9, 0.0],
                vec![0.0, 0.1, 0.9],
            ],
        )
    }

    #[test]
    fn test_similarity_ranks_closest_first() {
        let s = store();
        let hits = s.search_similar(&[1.0, 0.0, 0.0], 2, &ChunkFilter::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].description, "deadlock basics");
    }

    #[test]
    fn test_similarity_filter_discards_non_matching() {
        let s = store();
        // Closest chunk is in subject "os"; filter to "db" must skip it
        let filter = ChunkFilter {
            subject: Some("db".to_string()),
            lesson: None,
        };
        let hits = s.search_similar(&[1.0, 0.0, 0.0], 2, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject, "db");
    }

    #[test]
    fn test_similarity_filter_exhausts_candidates() {
        let s = store();
        let filter = ChunkFilter {
            subject: Some("missing".to_string()),
            lesson: None,
        };
        assert!(s.search_similar(&[1.0, 0.0, 0.0], 5, &filter).is_empty());
    }

    #[test]
    fn test_keyword_scan_case_insensitive() {
        let s = store();
        let hits = s.search_keywords(&["DEADLOCK".to_string()], 10, &ChunkFilter::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description, "deadlock basics");
    }

    #[test]
    fn test_keyword_scan_respects_filter_and_limit() {
        let s = store();
        let filter = ChunkFilter {
            subject: None,
            lesson: Some("l1".to_string()),
        };
        let hits = s.search_keywords(
            &["deadlock".to_string(), "join".to_string()],
            1,
            &filter,
        );
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_keyword_scan_empty_query_returns_nothing() {
        let s = store();
        assert!(s.search_keywords(&[], 10, &ChunkFilter::default()).is_empty());
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");

        let s = store();
        s.persist(&path).unwrap();

        let loaded = ChunkStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        let hits = loaded.search_keywords(&["sql".to_string()], 10, &ChunkFilter::default());
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_load_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let s = ChunkStore::load(&dir.path().join("nope.json")).unwrap();
        assert!(s.is_empty());
    }
}
