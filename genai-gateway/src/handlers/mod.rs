//! HTTP handlers for the gateway.
//!
//! Handlers only extract, delegate to [`crate::services::GenerationGateway`]
//! and serialize.

pub mod chat;
pub mod embed;
pub mod health;
pub mod metrics;
pub mod models;
pub mod text;
pub mod vision;

use crate::error::{GatewayError, Operation};
use axum::{extract::rejection::JsonRejection, Json};

/// Unwrap a JSON body, reporting a malformed one as a failure of `operation`.
pub(crate) fn json_body<T>(
    operation: Operation,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, GatewayError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| GatewayError::failed(operation, rejection.body_text()))
}
