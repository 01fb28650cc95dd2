use super::{GenerationUsage, SamplingParams};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
    /// Falls back to the configured text model.
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

/// Response of the single-shot text endpoints (`/generate`, `/vision/generate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub text: String,
    pub usage: GenerationUsage,
}
