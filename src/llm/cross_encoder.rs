//! Pairwise relevance scoring via an OpenAI-compatible `/v1/rerank` sidecar.
//!
//! One batch request scores every (question, chunk description) pair; the
//! caller decides what to do with the ordering.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;

/// Score for a single candidate document.
#[derive(Debug, Clone)]
pub struct RelevanceScore {
    /// Index into the documents array passed to [`score_batch`].
    pub index: usize,
    /// Relevance in [0, 1] after sigmoid normalization of the raw logit.
    pub score: f32,
}

/// Score `documents` against `query` with the configured cross-encoder.
/// Returns one entry per document sorted descending by score (stable, so
/// exact ties keep their input order). Errors if the sidecar is not
/// configured or unreachable; the caller falls back to insertion order.
pub async fn score_batch(
    client: &reqwest::Client,
    config: &RerankerConfig,
    query: &str,
    documents: &[String],
) -> Result<Vec<RelevanceScore>> {
    let base_url = config
        .base_url
        .as_deref()
        .context("Reranker base_url not configured")?;

    let model = config.model.as_deref().unwrap_or("default");

    let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

    let req_body = RerankRequest {
        model: model.to_string(),
        query: query.to_string(),
        documents: documents.to_vec(),
        top_n: documents.len(),
    };

    let timeout = std::time::Duration::from_secs(config.timeout_secs.min(30));

    let resp = client
        .post(&url)
        .timeout(timeout)
        .json(&req_body)
        .send()
        .await
        .context("Failed to reach reranker endpoint")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Reranker returned {status}: {body}");
    }

    let body: RerankResponse = resp
        .json()
        .await
        .context("Failed to parse reranker response")?;

    let mut results: Vec<RelevanceScore> = body
        .results
        .into_iter()
        .map(|r| RelevanceScore {
            index: r.index,
            score: sigmoid(r.relevance_score),
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    Ok(results)
}

/// Sigmoid normalization: maps raw logits to the 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}
