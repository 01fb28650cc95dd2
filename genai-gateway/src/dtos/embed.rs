use serde::{Deserialize, Serialize};

pub const DEFAULT_TASK_TYPE: &str = "RETRIEVAL_QUERY";

/// A single text or a batch; the response mirrors whichever was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub text: EmbedInput,
    /// Falls back to the configured embedding model.
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default = "default_task_type")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_task_type() -> Option<String> {
    Some(DEFAULT_TASK_TYPE.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    Single(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedApiResponse {
    pub embedding: Embedding,
    pub usage: EmbeddingUsage,
}
