use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use common::storage::types::prompt_job::JobView;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptResponse {
    pub uuid: String,
}

pub async fn generate_prompt(
    State(state): State<ApiState>,
    Json(input): Json<PromptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(prompt_bytes = input.prompt.len(), "Received prompt");

    let uuid = state.jobs.submit(input.prompt)?;

    Ok(Json(PromptResponse { uuid }))
}

pub async fn prompt_status(
    State(state): State<ApiState>,
    Path(uuid): Path<String>,
) -> Json<JobView> {
    info!(%uuid, "Received prompt status request");

    Json(state.jobs.poll(&uuid))
}
