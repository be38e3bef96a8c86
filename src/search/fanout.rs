//! Parallel multi-query retrieval.
//!
//! One similarity search per non-empty query string (the original question,
//! its paraphrases, and the answer text) plus one keyword scan, all run
//! concurrently on a semaphore-bounded pool. Branch failures are logged and
//! excluded from the merge; they never abort the other branches. Merged
//! candidates are deduplicated by [`KnowledgeChunk::dedup_key`]
//! (first-seen-wins) and reranked against the original question with the
//! cross-encoder, falling back to insertion order when scoring fails.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RerankerConfig;
use crate::llm::cross_encoder;
use crate::llm::provider::LlmProvider;
use crate::models::KnowledgeChunk;
use crate::search::store::{ChunkFilter, ChunkStore};

/// Everything the fan-out needs for one retrieval round.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub question: String,
    pub similar_questions: Vec<String>,
    pub answer: String,
    pub keywords: Vec<String>,
    pub filter: ChunkFilter,
}

/// Run all fan-out branches and merge their results. Returns an empty vec
/// (not an error) when every branch fails or finds nothing.
pub async fn gather_candidates(
    store: Arc<ChunkStore>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: &str,
    query: &RetrievalQuery,
    fetch_k: usize,
    concurrency: usize,
) -> Vec<KnowledgeChunk> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::new();

    let mut vector_queries: Vec<&str> = vec![query.question.as_str()];
    vector_queries.extend(query.similar_questions.iter().map(|q| q.as_str()));
    vector_queries.push(query.answer.as_str());

    for q in vector_queries {
        let q = q.trim().to_string();
        if q.is_empty() {
            continue;
        }
        let store = store.clone();
        let provider = provider.clone();
        let model = embedding_model.to_string();
        let filter = query.filter.clone();
        let sem = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await;
            let embedding = provider
                .embed(&[q.clone()], &model)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("No embedding returned for query"))?;
            Ok::<_, anyhow::Error>(store.search_similar(&embedding, fetch_k, &filter))
        }));
    }

    if !query.keywords.is_empty() {
        let store = store.clone();
        let keywords = query.keywords.clone();
        let filter = query.filter.clone();
        let sem = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await;
            Ok(store.search_keywords(&keywords, fetch_k, &filter))
        }));
    }

    // Join in submission order so the merge (and the rerank fallback) is
    // deterministic.
    let mut branch_results = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Ok(chunks)) => branch_results.push(chunks),
            Ok(Err(e)) => tracing::warn!("Retrieval branch failed: {e}"),
            Err(e) => tracing::warn!("Retrieval branch panicked: {e}"),
        }
    }

    merge_unique(branch_results)
}

/// Collapse branch results into one list keyed by the derived dedup key.
/// The first occurrence of a key wins; later duplicates are dropped.
pub fn merge_unique(branch_results: Vec<Vec<KnowledgeChunk>>) -> Vec<KnowledgeChunk> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for chunks in branch_results {
        for chunk in chunks {
            if seen.insert(chunk.dedup_key()) {
                merged.push(chunk);
            }
        }
    }
    merged
}

/// Rerank `candidates` against `question` by scoring their descriptions
/// with the cross-encoder, keeping the top `top_n`. Degrades to the first
/// `top_n` in insertion order when the scorer is unavailable.
pub async fn rerank_candidates(
    client: &reqwest::Client,
    config: &RerankerConfig,
    question: &str,
    mut candidates: Vec<KnowledgeChunk>,
    top_n: usize,
) -> Vec<KnowledgeChunk> {
    if candidates.is_empty() {
        return candidates;
    }

    let documents: Vec<String> = candidates.iter().map(|c| c.description.clone()).collect();

    match cross_encoder::score_batch(client, config, question, &documents).await {
        Ok(scores) => {
            let mut picked = Vec::with_capacity(top_n.min(candidates.len()));
            let mut taken: Vec<Option<KnowledgeChunk>> =
                candidates.into_iter().map(Some).collect();
            for s in scores {
                if picked.len() >= top_n {
                    break;
                }
                if let Some(slot) = taken.get_mut(s.index) {
                    if let Some(chunk) = slot.take() {
                        picked.push(chunk);
                    }
                }
            }
            picked
        }
        Err(e) => {
            tracing::warn!("Reranking failed, returning unranked candidates: {e}");
            candidates.truncate(top_n);
            candidates
        }
    }
}

/// Full retrieval round: fan-out, merge, rerank.
#[allow(clippy::too_many_arguments)]
pub async fn retrieve(
    client: &reqwest::Client,
    reranker: &RerankerConfig,
    store: Arc<ChunkStore>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: &str,
    query: &RetrievalQuery,
    fetch_k: usize,
    concurrency: usize,
    top_n: usize,
) -> Vec<KnowledgeChunk> {
    let candidates =
        gather_candidates(store, provider, embedding_model, query, fetch_k, concurrency).await;

    if candidates.is_empty() {
        tracing::info!("No retrieval candidates found for reranking");
        return Vec::new();
    }

    tracing::info!("{} unique candidates found for reranking", candidates.len());
    rerank_candidates(client, reranker, &query.question, candidates, top_n).await
}
