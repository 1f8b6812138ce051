use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Process is up.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// The router is only built after corpus preparation succeeded, so readiness
/// reports the corpus the job manager is bound to.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let corpus = state.jobs.corpus();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "checks": { "corpus": "ok" },
            "vector_store_id": corpus.vector_store_id,
        })),
    )
}
