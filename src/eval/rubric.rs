//! Rubric grading of an answer against the checklist.
//!
//! The model assigns each item one of the five coverage categories; the
//! points and the total are computed here from the fixed multipliers. The
//! answer is the primary evidence; context is advisory, used to resolve
//! factual uncertainty, and the scale deliberately leans toward partial
//! credit for effort.

use serde::Deserialize;

use crate::eval::EvalError;
use crate::llm::json;
use crate::llm::provider::{complete_with_retry, LlmProvider};
use crate::models::{ChecklistItem, Coverage, CoverageVerdict};

pub async fn grade(
    provider: &dyn LlmProvider,
    model: &str,
    answer: &str,
    checklist: &[ChecklistItem],
    context: &str,
) -> Result<Vec<CoverageVerdict>, EvalError> {
    let prompt = build_prompt(answer, checklist, context);
    let response = complete_with_retry(provider, &prompt, model)
        .await
        .map_err(|source| EvalError::Llm {
            stage: "rubric",
            source,
        })?;
    parse_verdicts(&response, checklist)
}

fn build_prompt(answer: &str, checklist: &[ChecklistItem], context: &str) -> String {
    let items: Vec<String> = checklist
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.requirement))
        .collect();

    format!(
        "You are a precise and generous grading assistant. Grade the student's \
         answer against each checklist item below. The answer is your primary \
         evidence; consult the reference context only when unsure about a fact. \
         Reward effort and partial knowledge.\n\n\
         For every item assign exactly one coverage category:\n\
         - fully_correct: the item is answered perfectly\n\
         - mostly_correct: excellent, with minor omissions\n\
         - partially_correct: on the right track, solid but incomplete\n\
         - mentioned_but_wrong: the key term appears but the explanation is wrong\n\
         - not_covered: the item is not addressed at all\n\n\
         Checklist:\n{}\n\n\
         Student answer:\n{answer}\n\n\
         Reference context (advisory only):\n{context}\n\n\
         Respond with ONLY a JSON object containing one entry per checklist \
         item, in order:\n\
         {{\"graded\": [{{\"coverage\": \"partially_correct\", \
         \"rationale\": \"one sentence\"}}]}}",
        items.join("\n")
    )
}

/// Parse per-item verdicts and attach computed points. The model must grade
/// every item exactly once, in checklist order; anything else is fatal.
fn parse_verdicts(
    content: &str,
    checklist: &[ChecklistItem],
) -> Result<Vec<CoverageVerdict>, EvalError> {
    let malformed = |reason: String| EvalError::MalformedOutput {
        stage: "rubric",
        reason,
    };

    #[derive(Deserialize)]
    struct Graded {
        graded: Vec<RawVerdict>,
    }

    #[derive(Deserialize)]
    struct RawVerdict {
        coverage: Coverage,
        #[serde(default)]
        rationale: String,
    }

    let slice = json::extract_object(content)
        .ok_or_else(|| malformed(format!("no JSON object in: {content}")))?;
    let parsed: Graded =
        serde_json::from_str(slice).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    if parsed.graded.len() != checklist.len() {
        return Err(malformed(format!(
            "expected {} verdicts, got {}",
            checklist.len(),
            parsed.graded.len()
        )));
    }

    Ok(parsed
        .graded
        .into_iter()
        .zip(checklist)
        .map(|(raw, item)| CoverageVerdict {
            requirement: item.requirement.clone(),
            max_points: item.max_points,
            coverage: raw.coverage,
            points: item.max_points * raw.coverage.multiplier(),
            rationale: raw.rationale,
        })
        .collect())
}

/// Raw rubric score: the sum of computed per-item points.
pub fn total_points(verdicts: &[CoverageVerdict]) -> f64 {
    verdicts.iter().map(|v| v.points).sum()
}
