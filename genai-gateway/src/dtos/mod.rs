pub mod chat;
pub mod embed;
pub mod generate;
pub mod models;
pub mod vision;

pub use chat::{ChatApiResponse, ChatMessage, ChatPart, ChatRequest, ChatRole};
pub use embed::{EmbedApiResponse, EmbedInput, EmbedRequest, Embedding, EmbeddingUsage};
pub use generate::{ApiResponse, GenerationRequest};
pub use models::{ModelInfo, ModelsResponse};
pub use vision::{ImageData, VisionRequest};

use crate::services::providers::GenerationParams;
use serde::{Deserialize, Serialize};

/// Optional sampling knobs, flattened into every generation request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl From<&SamplingParams> for GenerationParams {
    fn from(params: &SamplingParams) -> Self {
        GenerationParams {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        }
    }
}

/// Token accounting for text generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sampling_params_stay_unset() {
        let params: SamplingParams = serde_json::from_str("{}").unwrap();
        assert_eq!(GenerationParams::from(&params), GenerationParams::default());
    }

    #[test]
    fn sampling_params_map_one_to_one() {
        let params: SamplingParams = serde_json::from_str(
            r#"{"temperature":0.2,"max_output_tokens":64,"top_p":0.9,"top_k":20}"#,
        )
        .unwrap();

        let mapped = GenerationParams::from(&params);
        assert_eq!(mapped.temperature, Some(0.2));
        assert_eq!(mapped.max_output_tokens, Some(64));
        assert_eq!(mapped.top_p, Some(0.9));
        assert_eq!(mapped.top_k, Some(20));
    }
}
