use super::json_body;
use crate::dtos::{EmbedApiResponse, EmbedRequest};
use crate::error::{GatewayError, Operation};
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};

#[axum::debug_handler]
pub async fn embed_text(
    State(state): State<AppState>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedApiResponse>, GatewayError> {
    let request = json_body(Operation::Embed, payload)?;
    Ok(Json(state.gateway.embed_text(request).await?))
}
