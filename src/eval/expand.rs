//! Retrieval expansion: paraphrased questions and probe keywords for the
//! fan-out. This stage is advisory: on any failure the pipeline falls back
//! to searching with the original question alone.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::llm::json;
use crate::llm::provider::{complete_with_retry, LlmProvider};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrievalExpansion {
    #[serde(default)]
    pub similar_questions: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

pub async fn expand(
    provider: &dyn LlmProvider,
    model: &str,
    question: &str,
    answer: &str,
) -> Result<RetrievalExpansion> {
    let prompt = build_prompt(question, answer);
    let response = complete_with_retry(provider, &prompt, model).await?;
    parse_expansion(&response)
}

fn build_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are a query optimizer for semantic search over lecture material. \
         Given a question and a student's answer, produce:\n\
         - 2 alternative phrasings of the question that could surface material \
         the original phrasing might miss\n\
         - 3 to 8 probe keywords (key terms from the question and answer, \
         including important acronyms)\n\n\
         Question:\n{question}\n\n\
         Student answer:\n{answer}\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"similar_questions\": [\"...\", \"...\"], \"keywords\": [\"...\"]}}"
    )
}

fn parse_expansion(content: &str) -> Result<RetrievalExpansion> {
    let slice = json::extract_object(content).context("no JSON object in expansion output")?;
    let mut expansion: RetrievalExpansion =
        serde_json::from_str(slice).context("invalid expansion JSON")?;
    expansion.similar_questions.retain(|q| !q.trim().is_empty());
    expansion.keywords.retain(|k| !k.trim().is_empty());
    Ok(expansion)
}
