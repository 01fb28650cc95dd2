use super::SamplingParams;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    pub mime_type: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VisionRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
    pub image_data: Vec<ImageData>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}
