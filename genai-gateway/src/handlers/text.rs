use super::json_body;
use crate::dtos::{ApiResponse, GenerationRequest};
use crate::error::{GatewayError, Operation};
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};

#[axum::debug_handler]
pub async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, GatewayError> {
    let request = json_body(Operation::GenerateText, payload)?;
    Ok(Json(state.gateway.generate_text(request).await?))
}
