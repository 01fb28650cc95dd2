mod common;

use common::{detail, TestApp};
use genai_gateway::services::providers::mock::{mock_embedding, RecordedCall};
use serde_json::{json, Value};

fn as_vector(value: &Value) -> Vec<f32> {
    value
        .as_array()
        .expect("embedding should be an array")
        .iter()
        .map(|v| v.as_f64().unwrap() as f32)
        .collect()
}

#[tokio::test]
async fn single_text_yields_single_vector() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/embed", &json!({ "text": "hello" })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(as_vector(&body["embedding"]), mock_embedding("hello"));
    assert_eq!(body["usage"]["total_tokens"], 1);

    match &app.provider.calls()[0] {
        RecordedCall::Embed {
            model,
            options,
            batch,
            ..
        } => {
            assert_eq!(model, "text-embedding-004");
            assert_eq!(options.task_type.as_deref(), Some("RETRIEVAL_QUERY"));
            assert!(!batch);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn list_yields_one_vector_per_item_in_order() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/embed",
            &json!({
                "text": ["a", "bb bb", "ccc"],
                "task_type": "RETRIEVAL_DOCUMENT",
                "title": "notes"
            }),
        )
        .await;

    let body: Value = response.json().await.unwrap();
    let embeddings = body["embedding"].as_array().unwrap();
    assert_eq!(embeddings.len(), 3);
    assert_eq!(as_vector(&embeddings[0]), mock_embedding("a"));
    assert_eq!(as_vector(&embeddings[1]), mock_embedding("bb bb"));
    assert_eq!(as_vector(&embeddings[2]), mock_embedding("ccc"));
    assert_eq!(body["usage"]["total_tokens"], 4);

    match &app.provider.calls()[0] {
        RecordedCall::Embed { options, batch, .. } => {
            assert!(batch);
            assert_eq!(options.task_type.as_deref(), Some("RETRIEVAL_DOCUMENT"));
            assert_eq!(options.title.as_deref(), Some("notes"));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn empty_list_yields_empty_list() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/embed", &json!({ "text": [] })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["embedding"], json!([]));
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn embed_reports_provider_failure() {
    let app = TestApp::spawn_failing("unknown model").await;

    let response = app.post_json("/embed", &json!({ "text": "hello" })).await;

    assert_eq!(response.status().as_u16(), 500);
    let detail = detail(response).await;
    assert!(detail.starts_with("Error generating embeddings: "));
    assert!(detail.contains("unknown model"));
}
