use super::{GenerationUsage, SamplingParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One content part of a chat turn.
///
/// Only the text of text parts reaches the provider. Every other key, and
/// every non-text part, is carried through untouched so it can be echoed
/// back in `updated_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatPart {
    Text {
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Unsupported(Map<String, Value>),
}

impl ChatPart {
    pub fn text(text: impl Into<String>) -> Self {
        ChatPart::Text {
            text: text.into(),
            extra: Map::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChatPart::Text { text, .. } => Some(text),
            ChatPart::Unsupported(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub parts: Vec<ChatPart>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![ChatPart::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            parts: vec![ChatPart::text(text)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[validate(length(min = 1, message = "new_message must not be empty"))]
    pub new_message: String,
    /// Falls back to the configured chat model.
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub text: String,
    pub updated_history: Vec<ChatMessage>,
    pub usage: GenerationUsage,
}
