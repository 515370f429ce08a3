use axum::{extract::State, http::StatusCode, Json};

use crate::api::routes::AppState;
use crate::models::{QueryRequest, QueryResponse};

/// Run a natural-language prompt through the query pipeline
///
/// Validation failures answer 400; every other outcome answers 200 with
/// `success` describing the result.
pub async fn execute_prompt_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let response = state.query_service.execute(payload).await;

    let status = if response.is_validation_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    (status, Json(response))
}
