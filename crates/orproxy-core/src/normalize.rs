//! Reshapes buffered (non-streamed) upstream replies into what the client expects.
//!
//! Classified upstream errors are delivered as HTTP 200 with the explanation in
//! the assistant message, for clients that never look at the status code.

use bytes::Bytes;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use orproxy_protocol::ollama::backfill_ollama_fields;
use orproxy_protocol::openai::create_chat_completions::response::CreateChatCompletionResponse;
use orproxy_protocol::openai::error::ProxyErrorEnvelope;

use crate::classify::{ErrorContext, kind_from_status, render_message, render_unclassified};
use crate::error::ErrorKind;

/// Upstream marker for a reply that cannot be resolved synchronously.
pub const PROCESSING_MARKER: &str = "OPENROUTER PROCESSING";

const ERROR_DETAIL_CHARS: usize = 200;
const PARSE_EXCERPT_CHARS: usize = 100;

/// Which response contract the inbound path promised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientResponseSchema {
    OpenAICompatible,
    OllamaCompatible,
}

impl ClientResponseSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientResponseSchema::OpenAICompatible => "openai",
            ClientResponseSchema::OllamaCompatible => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub status: u16,
    pub body: Bytes,
    /// Classification of a proxy-made error or placeholder body. `None` for
    /// passthrough successes and unclassified upstream errors.
    pub kind: Option<ErrorKind>,
}

/// Error detail pulled out of an upstream error body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamErrorDetail {
    pub message: String,
    pub provider: Option<String>,
}

pub fn normalize_response(
    schema: ClientResponseSchema,
    requested_model: &str,
    upstream_status: u16,
    body_text: &str,
    now: OffsetDateTime,
) -> NormalizedResponse {
    if body_text.contains(PROCESSING_MARKER) {
        let content = render_message(ErrorKind::ProcessingPlaceholder, &ErrorContext::default());
        let resp = CreateChatCompletionResponse::synthetic("chatcmpl", requested_model, content, now);
        return synthetic(resp, ErrorKind::ProcessingPlaceholder);
    }

    if !(200..300).contains(&upstream_status) {
        let detail = upstream_error_detail(body_text);
        let kind = kind_from_status(upstream_status, body_text);
        let content = match kind {
            Some(kind) => render_message(
                kind,
                &ErrorContext {
                    status: Some(upstream_status),
                    detail: Some(&detail.message),
                    provider: detail.provider.as_deref(),
                    model: (kind == ErrorKind::ModelNotFound).then_some(requested_model),
                },
            ),
            None => render_unclassified(upstream_status, &detail.message),
        };
        let resp = CreateChatCompletionResponse::synthetic("error", requested_model, content, now);
        return NormalizedResponse {
            status: 200,
            body: Bytes::from(serde_json::to_vec(&resp).unwrap_or_default()),
            kind,
        };
    }

    let mut value = match serde_json::from_str::<JsonValue>(body_text) {
        Ok(value) => value,
        Err(err) => {
            let content = format!(
                "Failed to parse upstream response: {err}\n\nRaw response: {}...",
                excerpt(body_text, PARSE_EXCERPT_CHARS)
            );
            let resp =
                CreateChatCompletionResponse::synthetic("error", requested_model, content, now);
            return synthetic(resp, ErrorKind::ResponseParseFailure);
        }
    };

    if schema == ClientResponseSchema::OllamaCompatible {
        backfill_ollama_fields(&mut value, now);
    }
    NormalizedResponse {
        status: upstream_status,
        body: Bytes::from(serde_json::to_vec(&value).unwrap_or_default()),
        kind: None,
    }
}

/// The upstream rejected a streaming request before any stream was opened:
/// answer with one JSON error envelope instead.
pub fn normalize_stream_rejection(
    requested_model: &str,
    upstream_status: u16,
    body_text: &str,
) -> NormalizedResponse {
    let detail = upstream_error_detail(body_text);
    let kind = kind_from_status(upstream_status, body_text);
    let message = match kind {
        Some(kind) => render_message(
            kind,
            &ErrorContext {
                status: Some(upstream_status),
                detail: Some(&detail.message),
                provider: detail.provider.as_deref(),
                model: Some(requested_model),
            },
        ),
        None => render_unclassified(upstream_status, &detail.message),
    };
    let envelope = ProxyErrorEnvelope::new(message, upstream_status.to_string())
        .with_provider(detail.provider)
        .with_model(Some(requested_model.to_string()));
    NormalizedResponse {
        status: 200,
        body: Bytes::from(serde_json::to_vec(&envelope).unwrap_or_default()),
        kind,
    }
}

/// `error.message`, then `error` as a string, then top-level `message`; raw
/// text (first 200 characters) when the body is not JSON or has none of these.
pub fn upstream_error_detail(body_text: &str) -> UpstreamErrorDetail {
    let fallback = || UpstreamErrorDetail {
        message: excerpt(body_text, ERROR_DETAIL_CHARS),
        provider: None,
    };
    let Ok(value) = serde_json::from_str::<JsonValue>(body_text) else {
        return fallback();
    };
    let error = value.get("error");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .or_else(|| error.and_then(JsonValue::as_str))
        .or_else(|| value.get("message").and_then(JsonValue::as_str));
    let Some(message) = message else {
        return fallback();
    };
    let provider = error
        .and_then(|e| e.get("metadata"))
        .and_then(|m| m.get("provider_name"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    UpstreamErrorDetail {
        message: message.to_string(),
        provider,
    }
}

fn synthetic(resp: CreateChatCompletionResponse, kind: ErrorKind) -> NormalizedResponse {
    NormalizedResponse {
        status: 200,
        body: Bytes::from(serde_json::to_vec(&resp).unwrap_or_default()),
        kind: Some(kind),
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
