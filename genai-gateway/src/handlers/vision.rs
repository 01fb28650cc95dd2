use super::json_body;
use crate::dtos::{ApiResponse, VisionRequest};
use crate::error::{GatewayError, Operation};
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};

#[axum::debug_handler]
pub async fn vision_generate(
    State(state): State<AppState>,
    payload: Result<Json<VisionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, GatewayError> {
    let request = json_body(Operation::VisionGenerate, payload)?;
    Ok(Json(state.gateway.vision_generate(request).await?))
}
