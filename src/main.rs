use axum::routing::{get, post, put};
use axum::{Json, Router};
use tracing_subscriber::EnvFilter;

use answer_grader::api;
use answer_grader::config::Config;
use answer_grader::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Chunk store: {}", config.store_path.display());
    tracing::info!(
        "LLM provider: {} ({})",
        config.llm.provider,
        config.llm.base_url
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/", get(service_info))
        .route("/api/evaluate", post(api::evaluate::evaluate))
        .route("/api/config", get(api::admin::get_config))
        .route("/api/config", put(api::admin::update_config))
        .route("/api/store", get(api::admin::store_stats))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "answer-grader",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
