//! Post-hoc bonus adjustment.
//!
//! Operates only on the rubric's per-item coverage categories, never on the
//! raw answer. Two stacking conditions:
//!
//! - Condition A: fewer than 2 items fall outside the fully/mostly-correct
//!   categories → +10 points.
//! - Condition B: A holds AND fully-correct items are at least as many as
//!   mostly-correct ones → a further +10 (total +20).
//!
//! The adjusted score is capped at 100 and the coarse band recomputed. The
//! adjuster is pure and infallible by construction, so the "never abort an
//! otherwise-successful evaluation" contract holds trivially; the pipeline
//! calls it exactly once per evaluation.

use crate::models::{band_for, Coverage, CoverageVerdict, EvaluationResult};

const POINTS_PER_CONDITION: f64 = 10.0;

/// Apply the bonus rules to a rubric-scored result. Results with no graded
/// items (triage short-circuits) pass through unmodified.
pub fn apply(mut result: EvaluationResult) -> EvaluationResult {
    if result.graded_items.is_empty() {
        tracing::debug!("Bonus skipped: no graded items");
        return result;
    }

    let bonus = bonus_points(&result.graded_items);
    if bonus == 0.0 {
        return result;
    }

    let adjusted = (result.raw_points + bonus).min(100.0);
    tracing::info!(
        "Bonus of {bonus} points: {:.2} -> {adjusted:.2}",
        result.raw_points
    );

    result.raw_points = adjusted;
    result.numeric_score = band_for(adjusted);
    result
        .summary
        .push_str(&format!(" A bonus of {bonus:.0} points was applied."));
    result
}

/// Flat bonus from the coverage-category counts: 0, 10, or 20.
pub fn bonus_points(items: &[CoverageVerdict]) -> f64 {
    let mut fully = 0usize;
    let mut mostly = 0usize;
    let mut other = 0usize;

    for item in items {
        match item.coverage {
            Coverage::FullyCorrect => fully += 1,
            Coverage::MostlyCorrect => mostly += 1,
            _ => other += 1,
        }
    }

    let condition_a = other < 2;
    let condition_b = condition_a && fully >= mostly;

    let mut bonus = 0.0;
    if condition_a {
        bonus += POINTS_PER_CONDITION;
    }
    if condition_b {
        bonus += POINTS_PER_CONDITION;
    }
    bonus
}
