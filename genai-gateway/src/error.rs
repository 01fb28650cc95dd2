use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::ErrorResponse;
use thiserror::Error;

/// Gateway operation, used to prefix failure messages and label metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GenerateText,
    Chat,
    ChatStream,
    VisionGenerate,
    Embed,
    ListModels,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GenerateText => "generate_text",
            Operation::Chat => "chat",
            Operation::ChatStream => "chat_stream",
            Operation::VisionGenerate => "vision_generate",
            Operation::Embed => "embed_text",
            Operation::ListModels => "list_models",
        }
    }

    pub fn failure_prefix(&self) -> &'static str {
        match self {
            Operation::GenerateText => "Error generating text",
            Operation::Chat => "Error in chat",
            Operation::ChatStream => "Error in chat stream",
            Operation::VisionGenerate => "Error generating vision response",
            Operation::Embed => "Error generating embeddings",
            Operation::ListModels => "Error listing models",
        }
    }
}

/// Every gateway failure is reported the same way: 500 with a prefixed message.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{}: {message}", .operation.failure_prefix())]
    ProviderOperationFailed {
        operation: Operation,
        message: String,
    },
}

impl GatewayError {
    pub fn failed(operation: Operation, message: impl ToString) -> Self {
        GatewayError::ProviderOperationFailed {
            operation,
            message: message.to_string(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            GatewayError::ProviderOperationFailed { operation, .. } => *operation,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        tracing::error!(operation = self.operation().as_str(), error = %detail, "Operation failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(detail)),
        )
            .into_response()
    }
}
