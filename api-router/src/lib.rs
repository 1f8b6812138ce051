use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    index::index,
    probes::{live, ready},
    prompt::{generate_prompt, prompt_status},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the prompt job API
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let prompts = Router::new()
        .route("/", get(index))
        .route("/prompt/generate", post(generate_prompt))
        .route("/prompt/status/{uuid}", get(prompt_status));

    probes.merge(prompts)
}
