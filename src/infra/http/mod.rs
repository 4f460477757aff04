//! HTTP surface: the generation endpoint and the generated-image route.

mod generate;
mod middleware;
mod outputs;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::pipeline::GenerationService;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub generation: Arc<GenerationService>,
}

/// Build the router. `body_limit` bounds the multipart request size in bytes.
pub fn build_router(state: HttpState, body_limit: usize) -> Router {
    let output_route = format!("/{}/{{file}}", state.generation.output().public_path());

    Router::new()
        .route(
            "/generate",
            post(generate::generate).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(&output_route, get(outputs::serve_output))
        .route("/_health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
