//! Reshaping between the caller's chat completions API and the backend's.
//!
//! Both directions are plain functions over owned values. The only non-determinism is in the
//! response direction, which stamps a fresh id and the current time.
use crate::mapping::ModelMapping;
use crate::schemas::{BackendRequest, BackendResponse, ChatRequest, ChatResponse};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

const CHAT_COMPLETION_OBJECT: &str = "chat.completion";

/// Build the backend request for `request`, resolving the model and filling in defaults.
///
/// `stream` is always false, whatever the caller sent.
pub fn to_backend_request(request: ChatRequest, mapping: &ModelMapping) -> BackendRequest {
    if let Some(stream) = request.stream.as_ref().filter(|v| is_truthy(v)) {
        debug!("Ignoring stream={}, responses are never streamed", stream);
    }

    BackendRequest {
        model: mapping.resolve(&request.model).to_owned(),
        messages: request.messages,
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: request
            .max_tokens
            .unwrap_or_else(|| DEFAULT_MAX_TOKENS.into()),
        stream: false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Build the caller-facing response from a backend completion.
///
/// `original_model` is the model the caller asked for; it's echoed back instead of the
/// backend model.
pub fn to_chat_response(response: BackendResponse, original_model: &str) -> ChatResponse {
    ChatResponse {
        id: generate_completion_id(),
        object: CHAT_COMPLETION_OBJECT.to_owned(),
        created: unix_timestamp(),
        model: original_model.to_owned(),
        choices: response.choices,
        usage: response.usage,
    }
}

static COMPLETION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a completion ID, unique within this process
fn generate_completion_id() -> String {
    let count = COMPLETION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("chatcmpl-{millis}-{count}")
}

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
