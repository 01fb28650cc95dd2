use super::json_body;
use crate::dtos::{ChatApiResponse, ChatRequest};
use crate::error::{GatewayError, Operation};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

#[axum::debug_handler]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatApiResponse>, GatewayError> {
    let request = json_body(Operation::Chat, payload)?;
    Ok(Json(state.gateway.chat(request).await?))
}

/// Relay the reply as `text/event-stream`, one `data:` event per fragment,
/// terminated by `data: [DONE]`.
pub async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, GatewayError> {
    let request = json_body(Operation::ChatStream, payload)?;
    let events = state.gateway.chat_stream(request).await?;

    Ok(Sse::new(events.map(|event| {
        Ok(Event::default().data(normalize_newlines(&event.into_data())))
    })))
}

/// SSE has no carriage returns inside `data:`; fold them into newlines.
fn normalize_newlines(data: &str) -> String {
    data.replace("\r\n", "\n").replace('\r', "\n")
}
