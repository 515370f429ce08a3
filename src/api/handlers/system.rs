use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::api::routes::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Most recent query history entries, newest first
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let history = state.storage.list_query_history(limit).await?;

    Ok(Json(serde_json::json!({
        "history": history,
        "count": history.len(),
    })))
}

/// Aggregate success/failure counts over the stored history
pub async fn history_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stats = state.storage.query_stats().await?;
    Ok(Json(serde_json::json!({ "stats": stats })))
}

/// Drop every cached prompt
pub async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.cache.clear();
    tracing::info!("Prompt cache cleared ({} entries)", cleared);

    Json(serde_json::json!({
        "success": true,
        "cleared": cleared,
    }))
}

/// Cache counters; expired entries are swept first so `entries` only counts live ones
pub async fn cache_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let expired = state.cache.cleanup_expired();
    if expired > 0 {
        tracing::debug!("Swept {} expired prompt cache entries", expired);
    }

    let stats = state.cache.stats();
    Json(serde_json::json!({
        "entries": state.cache.len(),
        "ttlMinutes": state.config.cache.ttl_minutes,
        "hitRatio": stats.hit_ratio(),
        "stats": stats,
    }))
}

/// Health of the AI generation service
pub async fn ai_status(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let available = state.llm.check_health().await;

    let (status, label) = if available {
        (StatusCode::OK, "available")
    } else {
        tracing::warn!("AI service health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "serviceUrl": state.config.llm.gateway_url,
        })),
    )
}

/// Connectivity check against the query database
pub async fn test_database(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.executor.test_connection().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "databaseType": state.executor.database_type(),
    })))
}
