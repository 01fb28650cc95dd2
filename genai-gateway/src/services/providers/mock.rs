//! Mock provider implementation for testing.

use super::{
    Content, EmbedOptions, EmbeddingResult, FinishReason, GenerationParams, GenerativeProvider,
    Part, ProviderError, ProviderModel, ProviderResponse, ProviderStream, StreamChunk,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// A call observed by [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Generate {
        model: String,
        contents: Vec<Content>,
        params: GenerationParams,
    },
    SendMessage {
        model: String,
        history: Vec<Content>,
        message: String,
        params: GenerationParams,
        stream: bool,
    },
    Embed {
        model: String,
        texts: Vec<String>,
        options: EmbedOptions,
        batch: bool,
    },
    ListModels,
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    FailMidStream(String),
}

/// Deterministic in-process provider.
pub struct MockProvider {
    behavior: Behavior,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Succeed)
    }

    /// Every call fails with `ProviderError::ApiError(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    /// Streams start normally, emit one fragment, then fail with `message`.
    pub fn failing_mid_stream(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::FailMidStream(message.into()))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) -> Result<(), ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match &self.behavior {
            Behavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            Behavior::Succeed | Behavior::FailMidStream(_) => Ok(()),
        }
    }
}

/// Deterministic vector derived from the text; distinct inputs give distinct vectors.
pub fn mock_embedding(text: &str) -> Vec<f32> {
    vec![
        text.len() as f32,
        text.split_whitespace().count() as f32,
        text.bytes().map(u32::from).sum::<u32>() as f32,
    ]
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate(
        &self,
        model: &str,
        contents: Vec<Content>,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.record(RecordedCall::Generate {
            model: model.to_string(),
            contents: contents.clone(),
            params: params.clone(),
        })?;

        let mut prompt = String::new();
        let mut images = 0;
        for part in contents.iter().flat_map(|c| c.parts.iter()) {
            match part {
                Part::Text(text) => prompt.push_str(text),
                Part::InlineImage { .. } => images += 1,
            }
        }

        let text = if images > 0 {
            format!("Mock response for: {} [{} image(s)]", prompt, images)
        } else {
            format!("Mock response for: {}", prompt)
        };

        Ok(ProviderResponse {
            input_tokens: word_count(&prompt),
            output_tokens: word_count(&text),
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn send_message(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let turns = history.len();
        self.record(RecordedCall::SendMessage {
            model: model.to_string(),
            history,
            message: message.to_string(),
            params: params.clone(),
            stream: false,
        })?;

        let text = format!("Mock reply to: {} (after {} turns)", message, turns);

        Ok(ProviderResponse {
            input_tokens: word_count(message),
            output_tokens: word_count(&text),
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn send_message_stream(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderStream, ProviderError> {
        self.record(RecordedCall::SendMessage {
            model: model.to_string(),
            history,
            message: message.to_string(),
            params: params.clone(),
            stream: true,
        })?;

        let chunks: Vec<Result<StreamChunk, ProviderError>> = match &self.behavior {
            Behavior::FailMidStream(error) => vec![
                Ok(StreamChunk::Text("Mock".to_string())),
                Err(ProviderError::NetworkError(error.clone())),
            ],
            _ => vec![
                Ok(StreamChunk::Text("Mock".to_string())),
                Ok(StreamChunk::Text(" streaming".to_string())),
                Ok(StreamChunk::Text(" reply".to_string())),
                Ok(StreamChunk::Text(" to:".to_string())),
                Ok(StreamChunk::Text(format!(" {}", message))),
                Ok(StreamChunk::Complete {
                    input_tokens: word_count(message),
                    output_tokens: 4 + word_count(message),
                    finish_reason: FinishReason::Complete,
                }),
            ],
        };

        Ok(Box::pin(tokio_stream::iter(chunks)) as ProviderStream)
    }

    async fn embed(
        &self,
        model: &str,
        text: &str,
        options: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError> {
        self.record(RecordedCall::Embed {
            model: model.to_string(),
            texts: vec![text.to_string()],
            options: options.clone(),
            batch: false,
        })?;

        Ok(EmbeddingResult {
            values: mock_embedding(text),
            token_count: word_count(text),
        })
    }

    async fn batch_embed(
        &self,
        model: &str,
        texts: &[String],
        options: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        self.record(RecordedCall::Embed {
            model: model.to_string(),
            texts: texts.to_vec(),
            options: options.clone(),
            batch: true,
        })?;

        Ok(texts
            .iter()
            .map(|text| EmbeddingResult {
                values: mock_embedding(text),
                token_count: word_count(text),
            })
            .collect())
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ProviderError> {
        self.record(RecordedCall::ListModels)?;

        Ok(vec![
            ProviderModel {
                name: "models/gemini-2.0-flash".to_string(),
                description: Some("Fast multimodal model".to_string()),
                supported_generation_methods: vec![
                    "generateContent".to_string(),
                    "countTokens".to_string(),
                ],
                input_token_limit: Some(1_048_576),
                output_token_limit: Some(8192),
            },
            ProviderModel {
                name: "models/text-embedding-004".to_string(),
                description: Some("Text embeddings".to_string()),
                supported_generation_methods: vec!["embedContent".to_string()],
                input_token_limit: Some(2048),
                output_token_limit: Some(1),
            },
            ProviderModel {
                name: "models/gemini-legacy".to_string(),
                description: None,
                supported_generation_methods: vec!["generateContent".to_string()],
                input_token_limit: None,
                output_token_limit: None,
            },
        ])
    }
}
