use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{query, system};
use crate::config::Config;
use crate::services::database::QueryExecutor;
use crate::services::{PromptCache, QueryService, SqlGenerationClient};
use crate::storage::SqliteStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
    pub cache: Arc<PromptCache>,
    pub storage: Arc<SqliteStorage>,
    pub llm: Arc<dyn SqlGenerationClient>,
    pub executor: Arc<dyn QueryExecutor>,
    pub config: Config,
}

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/query", post(query::execute_prompt_query))
        .route("/api/history", get(system::list_history))
        .route("/api/history/stats", get(system::history_stats))
        .route("/api/cache/clear", post(system::clear_cache))
        .route("/api/cache/stats", get(system::cache_stats))
        .route("/api/system/ai-status", get(system::ai_status))
        .route("/api/system/db-test", get(system::test_database))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
