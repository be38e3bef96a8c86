//! Cheap first-pass classification of an answer.
//!
//! The model decomposes the question into its requirements internally and
//! buckets the answer: off-topic (score 0), a complete structural attempt
//! at every requirement (score 5, correctness not required), or in need of
//! full checklist grading.

use serde_json::Value;

use crate::eval::EvalError;
use crate::llm::json;
use crate::llm::provider::{complete_with_retry, LlmProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// Answer ignores the question's central ask.
    ScoreZero(String),
    /// Answer attempts every identified requirement.
    ScoreFive(String),
    /// At least one requirement is unaddressed, or coverage is unjudgeable.
    NeedsDetail(String),
}

pub async fn classify(
    provider: &dyn LlmProvider,
    model: &str,
    question: &str,
    answer: &str,
) -> Result<TriageOutcome, EvalError> {
    let prompt = build_prompt(question, answer);
    let response = complete_with_retry(provider, &prompt, model)
        .await
        .map_err(|source| EvalError::Llm {
            stage: "triage",
            source,
        })?;
    parse_outcome(&response)
}

fn build_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are a pragmatic triage assistant. Check whether the structure of a \
         student's answer matches the structure of the question.\n\n\
         Step 1: break the question down into its separate requirements.\n\
         Step 2: apply exactly one of these rules:\n\
         - Score 5 (complete attempt): the answer ATTEMPTS to address EVERY \
         requirement. Factual precision does not matter, only that each part of \
         the question got a response.\n\
         - Score 0 (irrelevant): the answer ignores the central task and talks \
         about something else. Mentioning a keyword in passing does not count.\n\
         - \"needs_detail\": at least one requirement is entirely unaddressed, or \
         the answer is too incoherent to judge.\n\n\
         Question:\n{question}\n\n\
         Student answer:\n{answer}\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"triage\": 0 | 5 | \"needs_detail\", \"rationale\": \"one sentence\"}}"
    )
}

/// Parse the triage JSON. Anything that does not resolve to 0, 5, or
/// "needs_detail" is fatal for the request; no partial credit for
/// partially-parsed output.
fn parse_outcome(content: &str) -> Result<TriageOutcome, EvalError> {
    let malformed = |reason: String| EvalError::MalformedOutput {
        stage: "triage",
        reason,
    };

    let slice = json::extract_object(content)
        .ok_or_else(|| malformed(format!("no JSON object in: {content}")))?;
    let value: Value =
        serde_json::from_str(slice).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let rationale = value
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or("Evaluation concluded during triage.")
        .to_string();

    match value.get("triage") {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => Ok(TriageOutcome::ScoreZero(rationale)),
            Some(5) => Ok(TriageOutcome::ScoreFive(rationale)),
            other => Err(malformed(format!("unexpected triage number: {other:?}"))),
        },
        Some(Value::String(s)) if s == "needs_detail" => Ok(TriageOutcome::NeedsDetail(rationale)),
        other => Err(malformed(format!("unexpected triage value: {other:?}"))),
    }
}
