use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::agent::Orchestrator;

pub mod handlers;
pub mod models;

pub fn create_router(orchestrator: Arc<Orchestrator>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/v1/ping", get(handlers::ping_handler))
        .route(
            "/api/chat/ask",
            post(handlers::ask_handler).get(handlers::ask_query_handler),
        )
        .with_state(orchestrator)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// `*` allows any origin without credentials; otherwise only the listed
/// origins, with credentials.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(origins)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}
