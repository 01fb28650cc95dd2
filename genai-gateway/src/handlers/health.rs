use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. Never touches the provider.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "service": "genai-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Generation gateway is running"
    }))
}
