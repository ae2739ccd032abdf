use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Inbound chat-completion body.
///
/// Kept as a raw JSON object so fields this proxy does not know about are
/// forwarded verbatim. Only `model` is ever rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreateChatCompletionRequestBody(Map<String, JsonValue>);

impl CreateChatCompletionRequestBody {
    /// Lenient parse: an empty, non-JSON, or non-object body becomes `{}`.
    pub fn from_slice_lenient(body: &[u8]) -> Self {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(JsonValue::Object(fields)) => Self(fields),
            _ => Self::default(),
        }
    }

    /// The caller-supplied model, if it is a non-empty string.
    pub fn model(&self) -> Option<&str> {
        self.0
            .get("model")
            .and_then(JsonValue::as_str)
            .filter(|model| !model.is_empty())
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.0
            .insert("model".to_string(), JsonValue::String(model.into()));
    }

    /// Only a literal `true` selects the streaming path.
    pub fn is_stream(&self) -> bool {
        matches!(self.0.get("stream"), Some(JsonValue::Bool(true)))
    }

    pub fn messages(&self) -> Option<&Vec<JsonValue>> {
        self.0.get("messages").and_then(JsonValue::as_array)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}
