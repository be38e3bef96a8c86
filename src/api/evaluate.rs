//! POST /api/evaluate handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::eval::{self, EvalError};
use crate::models::{EvaluateRequest, EvaluationResult};
use crate::state::AppState;

pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluationResult>, (StatusCode, String)> {
    let question = req.question.trim();
    let answer = req.answer.trim();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Question cannot be empty".to_string(),
        ));
    }
    if answer.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Answer cannot be empty".to_string(),
        ));
    }

    if let Some(cached) = state.eval_cache.get(question, answer) {
        tracing::info!("Cache hit for question: '{question}'");
        return Ok(Json(cached));
    }

    let normalized = EvaluateRequest {
        question: question.to_string(),
        answer: answer.to_string(),
        subject: req.subject,
        lesson: req.lesson,
    };

    let result = eval::run_evaluation(&state, &normalized)
        .await
        .map_err(|e| {
            tracing::error!("Evaluation failed: {e}");
            let status = match e {
                EvalError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })?;

    state.eval_cache.put(question, answer, result.clone());
    Ok(Json(result))
}
