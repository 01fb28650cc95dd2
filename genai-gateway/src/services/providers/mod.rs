//! Generative-AI provider abstraction.
//!
//! The gateway only talks to the remote model through [`GenerativeProvider`],
//! so the concrete backend (Gemini, or the in-process mock used by tests) can
//! be swapped without touching request handling.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::ContentFiltered(_) => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One piece of generation input.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw image bytes; providers encode them as their wire format requires.
    InlineImage { mime_type: String, data: Vec<u8> },
}

/// An ordered group of parts attributed to one role.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }
}

/// Sampling parameters. `None` leaves the model default in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_provider(reason: Option<&str>) -> Self {
        match reason {
            None | Some("STOP") => FinishReason::Complete,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST")
            | Some("PROHIBITED_CONTENT") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        }
    }
}

/// Result of a non-streaming generation call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

/// Stream chunk for streaming responses.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Incremental text.
    Text(String),

    /// Final usage stats; always the last item of a successful stream.
    Complete {
        input_tokens: u32,
        output_tokens: u32,
        finish_reason: FinishReason,
    },
}

/// Type alias for provider streams.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Embedding hints forwarded with every embedding call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedOptions {
    pub task_type: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub values: Vec<f32>,
    pub token_count: u32,
}

/// Model metadata as reported by the provider; absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderModel {
    pub name: String,
    pub description: Option<String>,
    pub supported_generation_methods: Vec<String>,
    pub input_token_limit: Option<u32>,
    pub output_token_limit: Option<u32>,
}

/// Capabilities the gateway needs from a generative-AI backend.
///
/// Implementations must be safe for unlimited concurrent use; the gateway
/// shares one instance across all requests.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Single-shot generation over the given contents.
    async fn generate(
        &self,
        model: &str,
        contents: Vec<Content>,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Send `message` in a conversation seeded with `history`.
    async fn send_message(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Streaming variant of [`GenerativeProvider::send_message`].
    async fn send_message_stream(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderStream, ProviderError>;

    /// Embed one text.
    async fn embed(
        &self,
        model: &str,
        text: &str,
        options: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError>;

    /// Embed several texts in one call; results follow input order.
    async fn batch_embed(
        &self,
        model: &str,
        texts: &[String],
        options: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError>;

    /// Every model the provider exposes.
    async fn list_models(&self) -> Result<Vec<ProviderModel>, ProviderError>;
}
