use crate::dtos::ModelsResponse;
use crate::error::GatewayError;
use crate::startup::AppState;
use axum::{extract::State, Json};

pub async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<ModelsResponse>, GatewayError> {
    Ok(Json(state.gateway.list_models().await?))
}
