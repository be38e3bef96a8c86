//! Multi-stage answer evaluation.
//!
//! The stages run strictly sequentially per request: triage may
//! short-circuit with a 0 or 5; otherwise retrieval expansion and the
//! parallel fan-out supply context, the checklist decomposes the question,
//! the rubric grades each item, and the bonus layer adjusts the final
//! score. Each stage has an explicit degrade-or-fail contract captured in
//! [`EvalError`]: retrieval, expansion, reranking, and bonus failures
//! degrade; malformed structured output and an empty checklist are fatal.

pub mod bonus;
pub mod cache;
pub mod checklist;
pub mod expand;
pub mod rubric;
pub mod triage;

use thiserror::Error;

use crate::models::{band_for, EvaluateRequest, EvaluationResult, KnowledgeChunk};
use crate::search::fanout::{self, RetrievalQuery};
use crate::search::store::ChunkFilter;
use crate::state::AppState;

/// Text handed to the rubric when retrieval produced nothing. The grader
/// must cope with missing context as a valid input.
const NO_CONTEXT_FOUND: &str = "No relevant context was found in the knowledge store.";

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("knowledge store is not loaded")]
    StoreUnavailable,

    #[error("{stage} stage failed: {source}")]
    Llm {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} stage returned malformed output: {reason}")]
    MalformedOutput { stage: &'static str, reason: String },

    #[error("checklist generation produced no items")]
    EmptyChecklist,
}

/// Run the full pipeline for one request. Caching is the caller's concern.
pub async fn run_evaluation(
    state: &AppState,
    req: &EvaluateRequest,
) -> Result<EvaluationResult, EvalError> {
    if state.store.is_empty() {
        return Err(EvalError::StoreUnavailable);
    }

    let (chat_model, embedding_model) = {
        let llm = state.llm_config.read();
        (llm.chat_model.clone(), llm.embedding_model.clone())
    };

    // Stage 1: triage. Extreme answers skip retrieval and grading entirely.
    tracing::info!("Triage for question: '{}'", req.question);
    let outcome =
        triage::classify(state.llm.as_ref(), &chat_model, &req.question, &req.answer).await?;

    match outcome {
        triage::TriageOutcome::ScoreZero(rationale) => {
            tracing::info!("Triage short-circuit: score 0");
            return Ok(short_circuit_result(0, rationale));
        }
        triage::TriageOutcome::ScoreFive(rationale) => {
            tracing::info!("Triage short-circuit: score 5");
            return Ok(short_circuit_result(5, rationale));
        }
        triage::TriageOutcome::NeedsDetail(rationale) => {
            tracing::info!("Triage: needs detailed analysis ({rationale})");
        }
    }

    // Stage 2: retrieval expansion. Degrades to original-question-only.
    let expansion =
        match expand::expand(state.llm.as_ref(), &chat_model, &req.question, &req.answer).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Retrieval expansion failed, using original question only: {e}");
                expand::RetrievalExpansion::default()
            }
        };

    // Stage 3: parallel fan-out retrieval + rerank. Empty context degrades.
    let query = RetrievalQuery {
        question: req.question.clone(),
        similar_questions: expansion.similar_questions,
        answer: req.answer.clone(),
        keywords: expansion.keywords,
        filter: ChunkFilter {
            subject: req.subject.clone(),
            lesson: req.lesson.clone(),
        },
    };
    let chunks = fanout::retrieve(
        &state.http_client,
        &state.config.reranker,
        state.store.clone(),
        state.llm.clone(),
        &embedding_model,
        &query,
        state.config.retrieval.fetch_k,
        state.config.retrieval.concurrency,
        state.config.retrieval.top_n,
    )
    .await;
    let context = build_context(&chunks);

    // Stage 4: checklist. Zero items is fatal, nothing can be scored.
    let items = checklist::generate(state.llm.as_ref(), &chat_model, &req.question).await?;
    tracing::info!(
        "Generated {} checklist items, {} points each",
        items.len(),
        items[0].max_points
    );

    // Stage 5: rubric grading. Points are computed here, not by the model.
    let verdicts =
        rubric::grade(state.llm.as_ref(), &chat_model, &req.answer, &items, &context).await?;
    let raw_points = rubric::total_points(&verdicts);
    let band = band_for(raw_points);
    tracing::info!("Rubric total: {raw_points:.2}/100 (band {band})");

    let result = EvaluationResult {
        numeric_score: band,
        raw_points,
        graded_items: verdicts,
        summary: format!(
            "The answer was analyzed in detail and scored {raw_points:.2}/100 points, \
             corresponding to grade {band}."
        ),
    };

    // Stage 6: bonus adjustment. Never fails the request.
    Ok(bonus::apply(result))
}

fn short_circuit_result(score: u8, rationale: String) -> EvaluationResult {
    EvaluationResult {
        numeric_score: score,
        raw_points: 0.0,
        graded_items: Vec::new(),
        summary: rationale,
    }
}

/// Format retrieved chunks into the advisory context block for the rubric.
fn build_context(chunks: &[KnowledgeChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_FOUND.to_string();
    }
    chunks
        .iter()
        .map(|c| format!("[{} / {}] {}", c.part_of, c.lesson, c.description))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
