//! Chat Completions payloads
//!
//! The inbound shapes follow the OpenAI Chat Completions API, the outbound ones follow what
//! OpenAI-style inference backends (e.g. NVIDIA NIM) accept and return.
//! See: https://platform.openai.com/docs/api-reference/chat

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Request body accepted on POST /v1/chat/completions (and its aliases)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model the caller asked for, before resolution
    pub model: String,

    /// The conversation, forwarded to the backend as-is
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Maximum tokens to generate. Any JSON number is accepted and forwarded as sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Number>,

    /// Accepted in any shape for compatibility. Responses are never streamed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<Value>,
}

/// A single message in the conversation.
///
/// `content` is kept as raw JSON so that both plain strings and content-part arrays survive the
/// trip, and any other keys (`name`, `tool_calls`, ...) are carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,

    #[serde(default)]
    pub content: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

/// Request body sent to `{backend}/chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    /// The resolved backend model
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: Number,
    /// Always false
    pub stream: bool,
}

/// The parts of a backend completion the gateway reads. Everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendResponse {
    pub choices: Vec<Choice>,

    /// Token accounting, passed through without interpretation. `None` only when absent.
    #[serde(default, deserialize_with = "present")]
    pub usage: Option<Value>,
}

/// One completion choice. Shared by the backend response and the response sent to the caller.
///
/// `index` and `finish_reason` are copied exactly: a `null` stays `null`, a missing key stays
/// missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub index: Option<Value>,
    pub message: ChoiceMessage,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_reason: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

/// Response body returned from POST /v1/chat/completions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    /// Always "chat.completion"
    pub object: String,
    /// Unix timestamp (seconds) of when the response was built
    pub created: u64,
    /// The model the caller asked for, not the one the backend ran
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// Maps a present key to `Some`, including an explicit `null`. Paired with `#[serde(default)]`
/// so that only a missing key becomes `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Body of every failed response: `{"error": ...}`.
///
/// `error` is either the backend's own error payload or a plain message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Value,
}
