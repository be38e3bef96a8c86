//! Admin endpoints: inspect the chunk store and adjust model names at
//! runtime.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Redacted view of the LLM configuration. The API key is never echoed
/// back; only its presence is reported.
#[derive(Debug, Serialize)]
pub struct LlmConfigResponse {
    pub provider: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub has_api_key: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoreStatsResponse {
    pub chunk_count: usize,
    pub store_path: String,
}

pub async fn get_config(State(state): State<AppState>) -> Json<LlmConfigResponse> {
    let llm = state.llm_config.read();
    Json(LlmConfigResponse {
        provider: llm.provider.clone(),
        base_url: llm.base_url.clone(),
        chat_model: llm.chat_model.clone(),
        embedding_model: llm.embedding_model.clone(),
        has_api_key: llm.api_key.is_some(),
    })
}

/// Only model names are mutable. Provider, base URL and API key are fixed
/// when the provider client is built at startup.
pub async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<LlmConfigResponse>, (StatusCode, String)> {
    {
        let mut llm = state.llm_config.write();
        if let Some(model) = req.chat_model {
            let model = model.trim().to_string();
            if model.is_empty() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "chat_model cannot be empty".to_string(),
                ));
            }
            tracing::info!("Chat model changed: {} -> {model}", llm.chat_model);
            llm.chat_model = model;
        }
        if let Some(model) = req.embedding_model {
            let model = model.trim().to_string();
            if model.is_empty() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "embedding_model cannot be empty".to_string(),
                ));
            }
            tracing::info!(
                "Embedding model changed: {} -> {model}",
                llm.embedding_model
            );
            llm.embedding_model = model;
        }
    }
    Ok(get_config(State(state)).await)
}

pub async fn store_stats(State(state): State<AppState>) -> Json<StoreStatsResponse> {
    Json(StoreStatsResponse {
        chunk_count: state.store.len(),
        store_path: state.config.store_path.display().to_string(),
    })
}
