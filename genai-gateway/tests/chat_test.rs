mod common;

use common::{detail, TestApp};
use genai_gateway::services::providers::mock::RecordedCall;
use genai_gateway::services::providers::{Part, Role};
use serde_json::{json, Value};

#[tokio::test]
async fn chat_extends_history_by_two_turns() {
    let app = TestApp::spawn().await;
    let history = json!([
        { "role": "user", "parts": [{ "text": "Hello" }] },
        { "role": "model", "parts": [{ "text": "Hi! How can I help?" }] }
    ]);

    let response = app
        .post_json(
            "/chat",
            &json!({ "history": history, "new_message": "Tell me a joke" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let text = body["text"].as_str().unwrap();
    assert_eq!(text, "Mock reply to: Tell me a joke (after 2 turns)");

    let updated = body["updated_history"].as_array().unwrap();
    assert_eq!(updated.len(), 4);
    assert_eq!(updated[0], history[0]);
    assert_eq!(updated[1], history[1]);
    assert_eq!(
        updated[2],
        json!({ "role": "user", "parts": [{ "text": "Tell me a joke" }] })
    );
    assert_eq!(
        updated[3],
        json!({ "role": "model", "parts": [{ "text": text }] })
    );
}

#[tokio::test]
async fn chat_with_empty_history() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/chat", &json!({ "history": [], "new_message": "Hi" }))
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated_history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn chat_forwards_only_text_parts_but_echoes_everything() {
    let app = TestApp::spawn().await;
    let odd_part = json!({ "inline_data": { "mime_type": "image/png", "data": "AAAA" } });
    let history = json!([
        { "role": "user", "parts": [odd_part.clone(), { "text": "look", "thought_signature": "abc" }] }
    ]);

    let response = app
        .post_json(
            "/chat",
            &json!({ "history": history, "new_message": "well?", "model_name": "gemini-1.5-pro" }),
        )
        .await;

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated_history"][0], history[0]);
    assert_eq!(body["updated_history"][0]["parts"][0], odd_part);

    match &app.provider.calls()[0] {
        RecordedCall::SendMessage {
            model,
            history,
            message,
            stream,
            ..
        } => {
            assert_eq!(model, "gemini-1.5-pro");
            assert_eq!(message, "well?");
            assert!(!stream);
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].role, Role::User);
            assert_eq!(history[0].parts, vec![Part::Text("look".into())]);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn chat_rejects_unknown_role() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/chat",
            &json!({
                "history": [{ "role": "assistant", "parts": [{ "text": "hi" }] }],
                "new_message": "hello"
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 500);
    assert!(detail(response).await.starts_with("Error in chat: "));
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn chat_reports_provider_failure() {
    let app = TestApp::spawn_failing("model overloaded").await;

    let response = app
        .post_json("/chat", &json!({ "history": [], "new_message": "Hi" }))
        .await;

    assert_eq!(response.status().as_u16(), 500);
    let detail = detail(response).await;
    assert!(detail.starts_with("Error in chat: "));
    assert!(detail.contains("model overloaded"));
}
