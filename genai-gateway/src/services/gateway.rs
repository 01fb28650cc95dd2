//! Gateway operations.
//!
//! Each operation validates its request, makes at most one provider call and
//! reshapes the result. Every failure leaves here as a [`GatewayError`].

use crate::config::{ModelConfig, StreamConfig};
use crate::dtos::{
    ApiResponse, ChatApiResponse, ChatMessage, ChatRequest, ChatRole, EmbedApiResponse,
    EmbedInput, EmbedRequest, Embedding, EmbeddingUsage, GenerationRequest, GenerationUsage,
    ImageData, ModelInfo, ModelsResponse, VisionRequest,
};
use crate::error::{GatewayError, Operation};
use crate::services::metrics;
use crate::services::providers::{
    Content, EmbedOptions, GenerationParams, GenerativeProvider, Part, ProviderError,
    ProviderModel, ProviderResponse, ProviderStream, Role, StreamChunk,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use image::ImageFormat;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use validator::Validate;

pub const STREAM_DONE: &str = "[DONE]";
pub const STREAM_ERROR: &str = "[ERROR]";

const GENERATE_CONTENT_METHOD: &str = "generateContent";
const STREAM_BUFFER: usize = 16;

/// One item of a chat stream as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Fragment(String),
    /// Failure after the stream started; always followed by `Done`.
    Error(String),
    Done,
}

impl StreamEvent {
    /// Payload of the `data:` line for this event.
    pub fn into_data(self) -> String {
        match self {
            StreamEvent::Fragment(text) => text,
            StreamEvent::Error(message) => format!("{} {}", STREAM_ERROR, message),
            StreamEvent::Done => STREAM_DONE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GenerationGateway {
    provider: Arc<dyn GenerativeProvider>,
    models: ModelConfig,
    pacing: Duration,
}

impl GenerationGateway {
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        models: ModelConfig,
        stream: &StreamConfig,
    ) -> Self {
        Self {
            provider,
            models,
            pacing: stream.pacing(),
        }
    }

    pub async fn generate_text(
        &self,
        request: GenerationRequest,
    ) -> Result<ApiResponse, GatewayError> {
        let operation = Operation::GenerateText;
        validate(operation, &request)?;

        let model = resolve_model(request.model_name.as_deref(), &self.models.text_model);
        let params = GenerationParams::from(&request.sampling);
        let contents = vec![Content::user(vec![Part::Text(request.prompt)])];

        let response = self
            .call(
                operation,
                model,
                self.provider.generate(model, contents, &params),
            )
            .await?;

        Ok(ApiResponse {
            usage: usage_of(model, &response),
            text: response.text,
        })
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatApiResponse, GatewayError> {
        let operation = Operation::Chat;
        validate(operation, &request)?;

        let model = resolve_model(request.model_name.as_deref(), &self.models.chat_model);
        let params = GenerationParams::from(&request.sampling);
        let history = to_provider_history(&request.history);

        let response = self
            .call(
                operation,
                model,
                self.provider
                    .send_message(model, history, &request.new_message, &params),
            )
            .await?;

        let usage = usage_of(model, &response);
        let mut updated_history = request.history;
        updated_history.push(ChatMessage::user(request.new_message));
        updated_history.push(ChatMessage::model(response.text.clone()));

        Ok(ChatApiResponse {
            text: response.text,
            updated_history,
            usage,
        })
    }

    /// Start a chat stream.
    ///
    /// Errors returned here happen before any event is produced. Later failures
    /// arrive in-band as [`StreamEvent::Error`].
    pub async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<ReceiverStream<StreamEvent>, GatewayError> {
        let operation = Operation::ChatStream;
        validate(operation, &request)?;

        let model = resolve_model(request.model_name.as_deref(), &self.models.chat_model);
        let params = GenerationParams::from(&request.sampling);
        let history = to_provider_history(&request.history);

        let upstream = self
            .call(
                operation,
                model,
                self.provider
                    .send_message_stream(model, history, &request.new_message, &params),
            )
            .await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(relay_stream(upstream, tx, self.pacing, model.to_string()));

        Ok(ReceiverStream::new(rx))
    }

    pub async fn vision_generate(
        &self,
        request: VisionRequest,
    ) -> Result<ApiResponse, GatewayError> {
        let operation = Operation::VisionGenerate;
        validate(operation, &request)?;

        let model = resolve_model(request.model_name.as_deref(), &self.models.vision_model);
        let params = GenerationParams::from(&request.sampling);

        let mut parts = Vec::with_capacity(request.image_data.len() + 1);
        parts.push(Part::Text(request.prompt));
        for (index, image) in request.image_data.into_iter().enumerate() {
            let part = decode_image(index, image)
                .map_err(|message| GatewayError::failed(operation, message))?;
            parts.push(part);
        }

        let response = self
            .call(
                operation,
                model,
                self.provider
                    .generate(model, vec![Content::user(parts)], &params),
            )
            .await?;

        Ok(ApiResponse {
            usage: usage_of(model, &response),
            text: response.text,
        })
    }

    pub async fn embed_text(&self, request: EmbedRequest) -> Result<EmbedApiResponse, GatewayError> {
        let operation = Operation::Embed;
        let model = resolve_model(request.model_name.as_deref(), &self.models.embedding_model);
        let options = EmbedOptions {
            task_type: request.task_type,
            title: request.title,
        };

        match request.text {
            EmbedInput::Single(text) => {
                let result = self
                    .call(operation, model, self.provider.embed(model, &text, &options))
                    .await?;

                Ok(EmbedApiResponse {
                    embedding: Embedding::Single(result.values),
                    usage: EmbeddingUsage {
                        total_tokens: result.token_count,
                    },
                })
            }
            EmbedInput::Batch(texts) if texts.is_empty() => Ok(EmbedApiResponse {
                embedding: Embedding::Batch(Vec::new()),
                usage: EmbeddingUsage::default(),
            }),
            EmbedInput::Batch(texts) => {
                let results = self
                    .call(
                        operation,
                        model,
                        self.provider.batch_embed(model, &texts, &options),
                    )
                    .await?;

                if results.len() != texts.len() {
                    return Err(GatewayError::failed(
                        operation,
                        ProviderError::InvalidResponse(format!(
                            "expected {} embeddings, got {}",
                            texts.len(),
                            results.len()
                        )),
                    ));
                }

                let total_tokens = results.iter().map(|r| r.token_count).sum();
                Ok(EmbedApiResponse {
                    embedding: Embedding::Batch(results.into_iter().map(|r| r.values).collect()),
                    usage: EmbeddingUsage { total_tokens },
                })
            }
        }
    }

    pub async fn list_models(&self) -> Result<ModelsResponse, GatewayError> {
        let models = self
            .call(Operation::ListModels, "all", self.provider.list_models())
            .await?;

        Ok(ModelsResponse {
            models: models
                .into_iter()
                .filter(|m| {
                    m.supported_generation_methods
                        .iter()
                        .any(|method| method == GENERATE_CONTENT_METHOD)
                })
                .map(model_info)
                .collect(),
        })
    }

    /// Time a provider call, record its outcome and map failures.
    async fn call<T, F>(&self, operation: Operation, model: &str, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                metrics::record_provider_call(operation.as_str(), model, "ok", elapsed);
                Ok(value)
            }
            Err(e) => {
                metrics::record_provider_call(operation.as_str(), model, "error", elapsed);
                metrics::record_provider_error(operation.as_str(), e.kind());
                tracing::warn!(
                    operation = operation.as_str(),
                    model = %model,
                    error = %e,
                    "Provider call failed"
                );
                Err(GatewayError::failed(operation, e))
            }
        }
    }
}

fn validate<T: Validate>(operation: Operation, request: &T) -> Result<(), GatewayError> {
    request
        .validate()
        .map_err(|e| GatewayError::failed(operation, e))
}

fn resolve_model<'a>(requested: Option<&'a str>, default: &'a str) -> &'a str {
    match requested {
        Some(model) if !model.trim().is_empty() => model,
        _ => default,
    }
}

fn usage_of(model: &str, response: &ProviderResponse) -> GenerationUsage {
    metrics::record_tokens(model, response.input_tokens, response.output_tokens);
    GenerationUsage {
        prompt_tokens: response.input_tokens,
        completion_tokens: response.output_tokens,
    }
}

/// Convert caller history into provider turns, keeping only text parts.
///
/// Order is preserved. Turns left with no text are dropped.
pub fn to_provider_history(history: &[ChatMessage]) -> Vec<Content> {
    history
        .iter()
        .filter_map(|message| {
            let parts: Vec<Part> = message
                .parts
                .iter()
                .filter_map(|part| part.as_text().map(|text| Part::Text(text.to_string())))
                .collect();

            if parts.is_empty() {
                tracing::debug!(role = ?message.role, "Skipping chat turn without text parts");
                return None;
            }

            let role = match message.role {
                ChatRole::User => Role::User,
                ChatRole::Model => Role::Model,
            };
            Some(Content { role, parts })
        })
        .collect()
}

/// Decode one base64 image and check it parses under its declared MIME type.
fn decode_image(index: usize, image: ImageData) -> Result<Part, String> {
    let bytes = STANDARD
        .decode(image.data.trim())
        .map_err(|e| format!("image {}: invalid base64 data: {}", index, e))?;

    let format = ImageFormat::from_mime_type(&image.mime_type).ok_or_else(|| {
        format!(
            "image {}: unsupported mime type '{}'",
            index, image.mime_type
        )
    })?;

    image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| format!("image {}: cannot decode as {}: {}", index, image.mime_type, e))?;

    Ok(Part::InlineImage {
        mime_type: image.mime_type,
        data: bytes,
    })
}

fn model_info(model: ProviderModel) -> ModelInfo {
    ModelInfo {
        name: model.name,
        description: model.description.unwrap_or_default(),
        supported_generation_methods: model.supported_generation_methods,
        input_token_limit: model.input_token_limit.unwrap_or(0),
        output_token_limit: model.output_token_limit.unwrap_or(0),
    }
}

/// Forward provider chunks to the consumer, pacing between fragments.
///
/// Ends with exactly one `Done`. Stops early once the receiver is dropped.
async fn relay_stream(
    mut upstream: ProviderStream,
    tx: mpsc::Sender<StreamEvent>,
    pacing: Duration,
    model: String,
) {
    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(model = %model, "Stream consumer went away");
                return;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(StreamChunk::Text(text))) => {
                if text.is_empty() {
                    continue;
                }
                if tx.send(StreamEvent::Fragment(text)).await.is_err() {
                    return;
                }
                if !pacing.is_zero() {
                    tokio::select! {
                        _ = tx.closed() => {
                            tracing::debug!(model = %model, "Stream consumer went away");
                            return;
                        }
                        _ = tokio::time::sleep(pacing) => {}
                    }
                }
            }
            Some(Ok(StreamChunk::Complete {
                input_tokens,
                output_tokens,
                ..
            })) => {
                metrics::record_tokens(&model, input_tokens, output_tokens);
            }
            Some(Err(e)) => {
                metrics::record_provider_error(Operation::ChatStream.as_str(), e.kind());
                tracing::warn!(model = %model, error = %e, "Chat stream failed mid-flight");
                let message = GatewayError::failed(Operation::ChatStream, e).to_string();
                if tx.send(StreamEvent::Error(message)).await.is_err() {
                    return;
                }
                break;
            }
            None => break,
        }
    }

    let _ = tx.send(StreamEvent::Done).await;
}
