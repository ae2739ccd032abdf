//! Ollama-compatible clients expect `id`, `object`, `created` and `usage`
//! on every chat response; some upstream models omit them.

use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;

use crate::openai::create_chat_completions::response::completion_id;

/// Fills the Ollama-expected fields that are missing or `null`. Fields already
/// present are never touched; non-object bodies are left as-is.
pub fn backfill_ollama_fields(body: &mut JsonValue, now: OffsetDateTime) {
    let JsonValue::Object(map) = body else {
        return;
    };
    fill(map, "id", || JsonValue::String(completion_id("chatcmpl", now)));
    fill(map, "object", || JsonValue::String("chat.completion".to_string()));
    fill(map, "created", || JsonValue::from(now.unix_timestamp()));
    fill(map, "usage", || {
        json!({
            "prompt_tokens": 0,
            "completion_tokens": 0,
            "total_tokens": 0
        })
    });
}

fn fill(
    map: &mut serde_json::Map<String, JsonValue>,
    key: &str,
    default: impl FnOnce() -> JsonValue,
) {
    match map.get(key) {
        Some(JsonValue::Null) | None => {
            map.insert(key.to_string(), default());
        }
        Some(_) => {}
    }
}
