//! Gemini AI provider implementation.
//!
//! Talks to the Gemini REST API (`v1beta`): content generation, SSE streaming,
//! single and batch embeddings, and model listing.

use super::{
    Content, EmbedOptions, EmbeddingResult, FinishReason, GenerationParams, GenerativeProvider,
    Part, ProviderError, ProviderModel, ProviderResponse, ProviderStream, StreamChunk,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
const MODELS_PAGE_SIZE: u32 = 1000;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
    /// Applies to non-streaming calls only; streams run until the provider ends them.
    pub request_timeout: Duration,
}

pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    /// Build the API URL for the given model and method.
    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base(), model_id(model), method)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    async fn generate_contents(
        &self,
        model: &str,
        contents: Vec<Content>,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = GenerateContentRequest::new(contents, params);

        tracing::debug!(
            model = %model,
            turns = request.contents.len(),
            "Sending request to Gemini API"
        );

        let api_response: GenerateContentResponse = self
            .send_json(
                self.post(&self.model_url(model, "generateContent"))
                    .json(&request),
            )
            .await?;

        api_response.into_provider_response()
    }

    async fn stream_contents(
        &self,
        model: &str,
        contents: Vec<Content>,
        params: &GenerationParams,
    ) -> Result<ProviderStream, ProviderError> {
        let request = GenerateContentRequest::new(contents, params);
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));

        tracing::debug!(
            model = %model,
            turns = request.contents.len(),
            "Starting streaming request to Gemini API"
        );

        let response = self
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(relay_sse(response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)) as ProviderStream)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate(
        &self,
        model: &str,
        contents: Vec<Content>,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.generate_contents(model, contents, params).await
    }

    async fn send_message(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.generate_contents(model, conversation(history, message), params)
            .await
    }

    async fn send_message_stream(
        &self,
        model: &str,
        history: Vec<Content>,
        message: &str,
        params: &GenerationParams,
    ) -> Result<ProviderStream, ProviderError> {
        self.stream_contents(model, conversation(history, message), params)
            .await
    }

    async fn embed(
        &self,
        model: &str,
        text: &str,
        options: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError> {
        let request = EmbedContentRequest::new(model, text, options);

        let response: EmbedContentResponse = self
            .send_json(self.post(&self.model_url(model, "embedContent")).json(&request))
            .await?;

        let embedding = response.embedding.ok_or_else(|| {
            ProviderError::InvalidResponse("Gemini returned no embedding".to_string())
        })?;

        Ok(EmbeddingResult {
            values: embedding.values,
            token_count: response
                .usage_metadata
                .map(|u| u.input_tokens())
                .unwrap_or(0),
        })
    }

    async fn batch_embed(
        &self,
        model: &str,
        texts: &[String],
        options: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest::new(model, text, options))
                .collect(),
        };

        tracing::debug!(model = %model, count = texts.len(), "Sending batch embedding request");

        let response: BatchEmbedContentsResponse = self
            .send_json(
                self.post(&self.model_url(model, "batchEmbedContents"))
                    .json(&request),
            )
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "Gemini returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }

        // Batch responses carry no per-item usage.
        Ok(response
            .embeddings
            .into_iter()
            .map(|e| EmbeddingResult {
                values: e.values,
                token_count: 0,
            })
            .collect())
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ProviderError> {
        let url = format!("{}/models", self.base());
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, self.config.api_key.expose_secret())
                .query(&[("pageSize", MODELS_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListModelsResponse = self.send_json(request).await?;
            models.extend(page.models.into_iter().map(ProviderModel::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }

        tracing::debug!(count = models.len(), "Listed Gemini models");

        Ok(models)
    }
}

/// History followed by the new user turn.
fn conversation(mut history: Vec<Content>, message: &str) -> Vec<Content> {
    history.push(Content::user(vec![Part::Text(message.to_string())]));
    history
}

/// Accept both `gemini-2.0-flash` and `models/gemini-2.0-flash`.
fn model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited(message));
    }

    Err(ProviderError::ApiError(format!(
        "Gemini API error {}: {}",
        status, message
    )))
}

/// Forward parsed SSE events from Gemini to the channel until either side ends.
async fn relay_sse(response: Response, tx: mpsc::Sender<Result<StreamChunk, ProviderError>>) {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();
    let mut input_tokens = 0u32;
    let mut output_tokens = 0u32;
    let mut finish_reason = FinishReason::Complete;

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Stream consumer dropped, abandoning Gemini stream");
                return;
            }
            next = stream.next() => next,
        };

        let (events, ended) = match next {
            Some(Ok(bytes)) => (parser.push(&bytes), false),
            Some(Err(e)) => {
                let _ = tx.send(Err(ProviderError::NetworkError(e.to_string()))).await;
                return;
            }
            None => (parser.finish().into_iter().collect::<Vec<_>>(), true),
        };

        for data in events {
            let event: GenerateContentResponse = match serde_json::from_str(&data) {
                Ok(event) => event,
                Err(e) => {
                    let _ = tx
                        .send(Err(ProviderError::InvalidResponse(format!(
                            "Failed to parse stream event: {}",
                            e
                        ))))
                        .await;
                    return;
                }
            };

            if let Some(usage) = &event.usage_metadata {
                input_tokens = usage.prompt_token_count.unwrap_or(input_tokens);
                output_tokens = usage.candidates_token_count.unwrap_or(output_tokens);
            }

            if let Some(reason) = event.block_reason() {
                let _ = tx
                    .send(Err(ProviderError::ContentFiltered(format!(
                        "prompt blocked: {}",
                        reason
                    ))))
                    .await;
                return;
            }

            if let Some(candidate) = event.candidates.first() {
                let text = candidate.text();
                if !text.is_empty() && tx.send(Ok(StreamChunk::Text(text))).await.is_err() {
                    return;
                }
                if candidate.finish_reason.is_some() {
                    finish_reason = FinishReason::from_provider(candidate.finish_reason.as_deref());
                }
            }
        }

        if ended {
            break;
        }
    }

    let _ = tx
        .send(Ok(StreamChunk::Complete {
            input_tokens,
            output_tokens,
            finish_reason,
        }))
        .await;
}

/// Incremental `text/event-stream` decoder yielding each event's `data` payload.
#[derive(Debug, Default)]
struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Feed raw bytes; returns the data of every event completed by them.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Gemini terminates lines with CRLF; JSON payloads never contain raw CR.
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = event_data(&raw[..end]) {
                events.push(data);
            }
        }
        events
    }

    /// Flush an event left without its terminating blank line.
    fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        event_data(&raw)
    }
}

fn event_data(raw: &[u8]) -> Option<String> {
    let event = String::from_utf8_lossy(raw);
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn new(contents: Vec<Content>, params: &GenerationParams) -> Self {
        Self {
            contents: contents.into_iter().map(WireContent::from).collect(),
            generation_config: GenerationConfig::from_params(params),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

impl From<Content> for WireContent {
    fn from(content: Content) -> Self {
        Self {
            role: Some(content.role.as_str()),
            parts: content.parts.into_iter().map(WirePart::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl From<Part> for WirePart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => WirePart::Text { text },
            Part::InlineImage { mime_type, data } => WirePart::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    /// `None` when every parameter is unset, so the field is omitted entirely.
    fn from_params(params: &GenerationParams) -> Option<Self> {
        if *params == GenerationParams::default() {
            return None;
        }
        Some(Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    fn into_provider_response(self) -> Result<ProviderResponse, ProviderError> {
        if let Some(reason) = self.block_reason() {
            return Err(ProviderError::ContentFiltered(format!(
                "prompt blocked: {}",
                reason
            )));
        }

        let candidate = self.candidates.first().ok_or_else(|| {
            ProviderError::InvalidResponse("response contained no candidates".to_string())
        })?;

        let finish_reason = FinishReason::from_provider(candidate.finish_reason.as_deref());
        let text = candidate.text();

        if text.is_empty() {
            return Err(match finish_reason {
                FinishReason::ContentFilter => ProviderError::ContentFiltered(format!(
                    "finish reason {}",
                    candidate.finish_reason.as_deref().unwrap_or_default()
                )),
                _ => ProviderError::InvalidResponse("response contained no text".to_string()),
            });
        }

        let usage = self.usage_metadata.unwrap_or_default();

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    /// Concatenated text of all non-thought parts.
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter(|p| !p.thought.unwrap_or(false))
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl UsageMetadata {
    fn input_tokens(&self) -> u32 {
        self.prompt_token_count
            .or(self.total_token_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: WireContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl EmbedContentRequest {
    fn new(model: &str, text: &str, options: &EmbedOptions) -> Self {
        Self {
            model: format!("models/{}", model_id(model)),
            content: WireContent {
                role: None,
                parts: vec![WirePart::Text {
                    text: text.to_string(),
                }],
            },
            task_type: options.task_type.clone(),
            title: options.title.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentResponse {
    #[serde(default)]
    embedding: Option<ContentEmbedding>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<WireModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireModel {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u32>,
    #[serde(default)]
    output_token_limit: Option<u32>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<WireModel> for ProviderModel {
    fn from(model: WireModel) -> Self {
        Self {
            name: model.name,
            description: model.description,
            supported_generation_methods: model.supported_generation_methods,
            input_token_limit: model.input_token_limit,
            output_token_limit: model.output_token_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
