use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;

use crate::agent::{Orchestrator, StreamEvent};

use super::models::{AskRequest, ErrorResponse, MessageResponse};

pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to Insight AI API!".to_string(),
    })
}

pub async fn ping_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "pong".to_string(),
    })
}

/// `POST /api/chat/ask` with a JSON body.
pub async fn ask_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<AskRequest>,
) -> Response {
    stream_answer(&orchestrator, request.query)
}

/// `GET /api/chat/ask?query=...`, for browser `EventSource` clients.
pub async fn ask_query_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(request): Query<AskRequest>,
) -> Response {
    stream_answer(&orchestrator, request.query)
}

fn stream_answer(orchestrator: &Orchestrator, query: String) -> Response {
    let query = query.trim().to_string();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Query parameter is required.".to_string(),
            }),
        )
            .into_response();
    }

    tracing::info!(query = %query, "Client connected to ask stream");

    // Dropping the response body (client disconnect) drops the run.
    let events = orchestrator
        .run(query)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

pub fn to_sse_event(event: &StreamEvent) -> Event {
    // SSE fields cannot carry carriage returns; line feeds become data lines.
    let data = event.data().replace("\r\n", "\n").replace('\r', "\n");
    Event::default().event(event.name()).data(data)
}
