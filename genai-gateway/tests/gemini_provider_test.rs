//! Drives the real Gemini provider against an in-process fake of the REST API.

mod common;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{detail, test_config};
use genai_gateway::startup::Application;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Received {
    call: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeGemini {
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeGemini {
    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn model_call(
    State(fake): State<FakeGemini>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.received.lock().unwrap().push(Received {
        call: call.clone(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let (model, method) = call.split_once(':').unwrap_or((call.as_str(), ""));

    if model == "missing-model" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": { "code": 404, "message": "models/missing-model is not found", "status": "NOT_FOUND" }
            })),
        )
            .into_response();
    }

    match method {
        "generateContent" => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello " }, { "text": "there" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5 }
        }))
        .into_response(),
        "streamGenerateContent" => {
            let events = [
                json!({ "candidates": [{ "content": { "parts": [{ "text": "Hel" }] } }] }),
                json!({ "candidates": [{ "content": { "parts": [{ "text": "lo" }] } }] }),
                json!({
                    "candidates": [{ "content": { "parts": [{ "text": "!" }] }, "finishReason": "STOP" }],
                    "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 3 }
                }),
            ];
            let body: String = events
                .iter()
                .map(|e| format!("data: {}\r\n\r\n", e))
                .collect();
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        "embedContent" => Json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })).into_response(),
        "batchEmbedContents" => {
            let count = fake
                .received()
                .last()
                .and_then(|r| r.body["requests"].as_array().map(Vec::len))
                .unwrap_or(0);
            let embeddings: Vec<Value> = (0..count)
                .map(|i| json!({ "values": [i as f32, 1.0] }))
                .collect();
            Json(json!({ "embeddings": embeddings })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_models(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    match query.get("pageToken").map(String::as_str) {
        None => Json(json!({
            "models": [
                {
                    "name": "models/gemini-2.0-flash",
                    "description": "Fast model",
                    "inputTokenLimit": 1048576,
                    "outputTokenLimit": 8192,
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {
                    "name": "models/text-embedding-004",
                    "supportedGenerationMethods": ["embedContent"]
                }
            ],
            "nextPageToken": "page-2"
        })),
        Some(_) => Json(json!({
            "models": [{
                "name": "models/gemini-1.5-pro",
                "supportedGenerationMethods": ["generateContent"]
            }]
        })),
    }
}

/// Start the fake API and a gateway pointed at it.
async fn spawn() -> (FakeGemini, String) {
    let fake = FakeGemini::default();
    let router = Router::new()
        .route("/v1beta/models", get(list_models))
        .route("/v1beta/models/:call", post(model_call))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let mut config = test_config();
    config.google.api_base = format!("http://{}/v1beta", fake_addr);

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (fake, address)
}

#[tokio::test]
async fn generate_round_trips_through_gemini() {
    let (fake, address) = spawn().await;

    let response = Client::new()
        .post(format!("{}/generate", address))
        .json(&json!({ "prompt": "Say hello", "temperature": 0.5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["text"], "Hello there");
    assert_eq!(body["usage"], json!({ "prompt_tokens": 3, "completion_tokens": 2 }));

    let received = fake.received();
    assert_eq!(received[0].call, "gemini-2.0-flash:generateContent");
    assert_eq!(received[0].api_key.as_deref(), Some("test-api-key"));
    assert_eq!(
        received[0].body,
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Say hello" }] }],
            "generationConfig": { "temperature": 0.5 }
        })
    );
}

#[tokio::test]
async fn chat_sends_history_then_new_message() {
    let (fake, address) = spawn().await;

    Client::new()
        .post(format!("{}/chat", address))
        .json(&json!({
            "history": [
                { "role": "user", "parts": [{ "text": "Hi" }] },
                { "role": "model", "parts": [{ "text": "Hello!" }] }
            ],
            "new_message": "Bye"
        }))
        .send()
        .await
        .unwrap();

    let body = &fake.received()[0].body;
    assert_eq!(
        body["contents"],
        json!([
            { "role": "user", "parts": [{ "text": "Hi" }] },
            { "role": "model", "parts": [{ "text": "Hello!" }] },
            { "role": "user", "parts": [{ "text": "Bye" }] }
        ])
    );
    assert!(body.get("generationConfig").is_none());
}

#[tokio::test]
async fn chat_stream_relays_sse_fragments() {
    let (fake, address) = spawn().await;

    let body = Client::new()
        .post(format!("{}/chat/stream", address))
        .json(&json!({ "history": [], "new_message": "Hello?" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "data: Hel\n\ndata: lo\n\ndata: !\n\ndata: [DONE]\n\n");
    assert_eq!(fake.received()[0].call, "gemini-2.0-flash:streamGenerateContent");
}

#[tokio::test]
async fn embed_uses_single_and_batch_calls() {
    let (fake, address) = spawn().await;
    let client = Client::new();

    let single: Value = client
        .post(format!("{}/embed", address))
        .json(&json!({ "text": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(single["embedding"].as_array().unwrap().len(), 3);

    let batch: Value = client
        .post(format!("{}/embed", address))
        .json(&json!({ "text": ["a", "b"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batch["embedding"], json!([[0.0, 1.0], [1.0, 1.0]]));

    let received = fake.received();
    assert_eq!(received[0].call, "text-embedding-004:embedContent");
    assert_eq!(received[0].body["model"], "models/text-embedding-004");
    assert_eq!(received[0].body["taskType"], "RETRIEVAL_QUERY");
    assert_eq!(received[1].call, "text-embedding-004:batchEmbedContents");
    assert_eq!(received[1].body["requests"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn models_follow_pagination_and_filter() {
    let (_fake, address) = spawn().await;

    let body: Value = Client::new()
        .get(format!("{}/models", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let names: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["models/gemini-2.0-flash", "models/gemini-1.5-pro"]);
    assert_eq!(body["models"][1]["input_token_limit"], 0);
}

#[tokio::test]
async fn gemini_error_message_reaches_caller() {
    let (_fake, address) = spawn().await;

    let response = Client::new()
        .post(format!("{}/generate", address))
        .json(&json!({ "prompt": "hi", "model_name": "missing-model" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let detail = detail(response).await;
    assert!(detail.starts_with("Error generating text: "));
    assert!(detail.contains("models/missing-model is not found"));
}
