//! Question decomposition into a weighted checklist.
//!
//! The model extracts 4-16 requirement strings by copying question
//! fragments verbatim (a prompt-level instruction, not verified here); the
//! point math is always done in our code. An empty decomposition is fatal;
//! nothing can be graded without at least one item.

use serde::Deserialize;

use crate::eval::EvalError;
use crate::llm::json;
use crate::llm::provider::{complete_with_retry, LlmProvider};
use crate::models::ChecklistItem;

pub async fn generate(
    provider: &dyn LlmProvider,
    model: &str,
    question: &str,
) -> Result<Vec<ChecklistItem>, EvalError> {
    let prompt = build_prompt(question);
    let response = complete_with_retry(provider, &prompt, model)
        .await
        .map_err(|source| EvalError::Llm {
            stage: "checklist",
            source,
        })?;
    let requirements = parse_requirements(&response)?;
    if requirements.is_empty() {
        return Err(EvalError::EmptyChecklist);
    }
    Ok(assign_points(requirements))
}

fn build_prompt(question: &str) -> String {
    format!(
        "You are a system for strict, literal question decomposition. Break the \
         question below into its separate gradable requirements.\n\n\
         Rules:\n\
         - Each requirement MUST be a directly copied fragment of the original \
         question. Do not paraphrase, reorder words, or add interpretation.\n\
         - Produce between 4 and 16 requirements; split or merge fragments as \
         needed to stay in that range.\n\n\
         Question:\n{question}\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"requirements\": [\"...\", \"...\"]}}"
    )
}

fn parse_requirements(content: &str) -> Result<Vec<String>, EvalError> {
    let malformed = |reason: String| EvalError::MalformedOutput {
        stage: "checklist",
        reason,
    };

    #[derive(Deserialize)]
    struct Decomposition {
        requirements: Vec<String>,
    }

    let slice = json::extract_object(content)
        .ok_or_else(|| malformed(format!("no JSON object in: {content}")))?;
    let parsed: Decomposition =
        serde_json::from_str(slice).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    Ok(parsed
        .requirements
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect())
}

/// Weight each requirement with an equal share of 100 points, rounded to
/// 2 decimals.
pub fn assign_points(requirements: Vec<String>) -> Vec<ChecklistItem> {
    let per_item = (100.0 / requirements.len() as f64 * 100.0).round() / 100.0;
    requirements
        .into_iter()
        .map(|requirement| ChecklistItem {
            requirement,
            max_points: per_item,
        })
        .collect()
}
