use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable unit of knowledge in the retrieval store. Written once by
/// the ingestion pipeline, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Raw source text of the chunk.
    pub content: String,
    /// Synthesized summary used for reranking and grading context.
    pub description: String,
    /// Unique keyword strings attached at ingestion time.
    pub keywords: Vec<String>,
    /// Questions this chunk was generated to answer.
    pub probe_questions: Vec<String>,
    /// Structural "part of" name, e.g. "Presentation SLIDE 15".
    pub part_of: String,
    pub subject: String,
    pub lesson: String,
    /// Source document the chunk was extracted from.
    pub source: String,
    pub ingested_at: DateTime<Utc>,
}

impl KnowledgeChunk {
    /// Derived deduplication key used when merging fan-out branches:
    /// (last token of the part-of name, lesson, first 50 chars of the
    /// description). Tolerates formatting drift across branches while
    /// collapsing true duplicates.
    pub fn dedup_key(&self) -> String {
        let part_suffix = self.part_of.split_whitespace().last().unwrap_or("");
        let desc_prefix: String = self.description.chars().take(50).collect();
        format!("{part_suffix}::{}::{desc_prefix}", self.lesson)
    }
}

/// Evaluation request: question plus the answer to grade, with optional
/// subject/lesson scoping of retrieval.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub question: String,
    pub answer: String,
    pub subject: Option<String>,
    pub lesson: Option<String>,
}

/// One of the five fixed coverage levels the rubric assigns per checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    FullyCorrect,
    MostlyCorrect,
    PartiallyCorrect,
    MentionedButWrong,
    NotCovered,
}

impl Coverage {
    /// Fixed point multiplier for this coverage level.
    pub fn multiplier(self) -> f64 {
        match self {
            Coverage::FullyCorrect => 1.0,
            Coverage::MostlyCorrect => 0.9,
            Coverage::PartiallyCorrect => 0.7,
            Coverage::MentionedButWrong => 0.5,
            Coverage::NotCovered => 0.0,
        }
    }
}

/// A single gradable requirement extracted from the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub requirement: String,
    pub max_points: f64,
}

/// Per-item grading outcome. `points` is always computed in our code as
/// `max_points × multiplier`, never taken from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageVerdict {
    pub requirement: String,
    pub max_points: f64,
    pub coverage: Coverage,
    pub points: f64,
    pub rationale: String,
}

/// Aggregate evaluation returned to the caller and cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Coarse numeric score: 0 or 5 from triage, 1-4 from the rubric band.
    pub numeric_score: u8,
    /// Raw rubric points in [0, 100]. Zero when triage short-circuited.
    pub raw_points: f64,
    pub graded_items: Vec<CoverageVerdict>,
    pub summary: String,
}

/// Map raw rubric points (0-100) to the coarse 1-4 band. Threshold-exact,
/// no smoothing: 64.99 is band 3, 65.0 is band 4.
pub fn band_for(points: f64) -> u8 {
    if points >= 65.0 {
        4
    } else if points >= 39.0 {
        3
    } else if points >= 20.0 {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(part_of: &str, lesson: &str, description: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            content: String::new(),
            description: description.to_string(),
            keywords: vec![],
            probe_questions: vec![],
            part_of: part_of.to_string(),
            subject: "os".to_string(),
            lesson: lesson.to_string(),
            source: "slides.pdf".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn test_band_thresholds_exact() {
        assert_eq!(band_for(65.0), 4);
        assert_eq!(band_for(64.99), 3);
        assert_eq!(band_for(39.0), 3);
        assert_eq!(band_for(38.99), 2);
        assert_eq!(band_for(20.0), 2);
        assert_eq!(band_for(19.99), 1);
        assert_eq!(band_for(0.0), 1);
        assert_eq!(band_for(100.0), 4);
    }

    #[test]
    fn test_coverage_multipliers_fixed() {
        assert_eq!(Coverage::FullyCorrect.multiplier(), 1.0);
        assert_eq!(Coverage::MostlyCorrect.multiplier(), 0.9);
        assert_eq!(Coverage::PartiallyCorrect.multiplier(), 0.7);
        assert_eq!(Coverage::MentionedButWrong.multiplier(), 0.5);
        assert_eq!(Coverage::NotCovered.multiplier(), 0.0);
    }

    #[test]
    fn test_coverage_serializes_snake_case() {
        let json = serde_json::to_value(Coverage::MentionedButWrong).unwrap();
        assert_eq!(json, "mentioned_but_wrong");
        let back: Coverage = serde_json::from_value(json).unwrap();
        assert_eq!(back, Coverage::MentionedButWrong);
    }

    #[test]
    fn test_dedup_key_uses_part_suffix_and_desc_prefix() {
        let c = chunk(
            "SLIDE 15",
            "lesson-3",
            "Deadlock occurs when processes wait on each other",
        );
        let key = c.dedup_key();
        assert!(key.starts_with("15::lesson-3::"));
    }

    #[test]
    fn test_dedup_key_collision_on_same_fields() {
        let long = "x".repeat(80);
        let a = chunk("Presentation SLIDE 4", "l1", &long);
        // Differs only past the 50-char description prefix
        let mut b = chunk("Other SLIDE 4", "l1", &long);
        b.description.push_str("trailing difference");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_dedup_key_multibyte_description() {
        // Prefix is taken on char boundaries, not bytes
        let c = chunk("SLIDE 1", "l1", &"ž".repeat(60));
        let key = c.dedup_key();
        assert!(key.ends_with(&"ž".repeat(50)));
    }

    #[test]
    fn test_dedup_key_empty_part_of() {
        let c = chunk("", "l1", "desc");
        assert!(c.dedup_key().starts_with("::l1::"));
    }
}
