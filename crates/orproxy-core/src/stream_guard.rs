//! Watches a live upstream SSE byte stream for embedded error payloads.
//!
//! Upstream errors can arrive mid-stream inside an ordinary `data:` frame.
//! [`StreamGuard`] sniffs each chunk with substring and regex matches (not a
//! parser) and, on the first hit, replaces it with one well-formed
//! `proxy_error` frame. Nothing from upstream is forwarded after that.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use orproxy_protocol::openai::error::ProxyErrorEnvelope;
use orproxy_protocol::sse::sse_data_frame;
use orproxy_provider_core::ByteStream;

use crate::classify::{
    ErrorContext, kind_from_keywords, kind_from_status, mentions_rate_limit,
    mentions_region_restriction, render_message,
};
use crate::error::ErrorKind;

const FALLBACK_ERROR_FRAME: &[u8] =
    b"data: {\"error\":{\"message\":\"Upstream stream error\",\"code\":\"upstream_error\",\"type\":\"proxy_error\"}}\n\n";

const UNCLASSIFIED_CODE: &str = "upstream_error";

static ERROR_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""error"\s*:"#).expect("valid regex"));
static CODE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""code"\s*:"#).expect("valid regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""code"\s*:\s*"?(\d{3})\b"#).expect("valid regex"));
static MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""message"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});
static PROVIDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""provider_name"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});
static MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""model"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});

/// Incremental UTF-8 decoder: a multi-byte sequence split across chunks is
/// held back until the rest arrives. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        let mut pos = 0;
        loop {
            match std::str::from_utf8(&self.pending[pos..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    pos = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = pos + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[pos..valid_up_to]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos = valid_up_to + len;
                        }
                        None => {
                            pos = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..pos);
        out
    }
}

/// Fields pulled out of a chunk that looks like an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamErrorFields {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

pub fn has_error_indicator(text: &str) -> bool {
    ERROR_KEY_RE.is_match(text)
        || CODE_KEY_RE.is_match(text)
        || mentions_rate_limit(text)
        || mentions_region_restriction(text)
}

pub fn extract_error_fields(text: &str) -> StreamErrorFields {
    StreamErrorFields {
        code: CODE_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        message: capture_string(&MESSAGE_RE, text),
        provider: capture_string(&PROVIDER_RE, text),
        model: capture_string(&MODEL_RE, text),
    }
}

fn capture_string(re: &Regex, text: &str) -> Option<String> {
    let raw = re.captures(text)?.get(1)?.as_str();
    let value = serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.to_string());
    Some(value).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Scanning,
    Suppressing,
}

/// Per-stream error sniffer. Moves from scanning to suppressing at most once.
#[derive(Debug)]
pub struct StreamGuard {
    state: GuardState,
    decoder: Utf8StreamDecoder,
    requested_model: String,
}

/// What the guard decided for one error-looking chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub frame: Bytes,
    pub kind: Option<ErrorKind>,
    pub code: String,
}

impl StreamGuard {
    pub fn new(requested_model: impl Into<String>) -> Self {
        Self {
            state: GuardState::Scanning,
            decoder: Utf8StreamDecoder::new(),
            requested_model: requested_model.into(),
        }
    }

    pub fn is_suppressing(&self) -> bool {
        self.state == GuardState::Suppressing
    }

    /// Bytes to send downstream for this chunk, if any.
    pub fn push(&mut self, chunk: &Bytes) -> Option<Bytes> {
        self.push_inspect(chunk).0
    }

    fn push_inspect(&mut self, chunk: &Bytes) -> (Option<Bytes>, Option<Substitution>) {
        if self.state == GuardState::Suppressing {
            return (None, None);
        }
        let text = self.decoder.decode(chunk);
        if !has_error_indicator(&text) {
            return (Some(chunk.clone()), None);
        }
        match self.substitute(&text) {
            Some(sub) => {
                self.state = GuardState::Suppressing;
                (Some(sub.frame.clone()), Some(sub))
            }
            None => (Some(chunk.clone()), None),
        }
    }

    /// `None` when the chunk only looked like an error: no kind matched and
    /// no message could be extracted.
    ///
    /// Classification reads the extracted fields only, never the raw chunk.
    fn substitute(&self, text: &str) -> Option<Substitution> {
        let fields = extract_error_fields(text);
        let context = fields.message.as_deref().unwrap_or_default();
        let kind = fields
            .code
            .and_then(|code| kind_from_status(code, context))
            .or_else(|| fields.message.as_deref().and_then(kind_from_keywords));
        let model = fields
            .model
            .clone()
            .unwrap_or_else(|| self.requested_model.clone());

        let (message, code) = match kind {
            Some(kind) => {
                let message = render_message(
                    kind,
                    &ErrorContext {
                        status: fields.code,
                        detail: fields.message.as_deref(),
                        provider: fields.provider.as_deref(),
                        model: Some(&model),
                    },
                );
                (message, fields.code.unwrap_or(kind.code()).to_string())
            }
            None => {
                let raw = fields.message.as_deref()?;
                let message = match fields.provider.as_deref() {
                    Some(provider) => format!("{provider}: {raw}"),
                    None => raw.to_string(),
                };
                let code = fields
                    .code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| UNCLASSIFIED_CODE.to_string());
                (message, code)
            }
        };

        let envelope = ProxyErrorEnvelope::new(message, code.clone())
            .with_provider(fields.provider)
            .with_model(Some(model));
        let frame = match serde_json::to_string(&envelope) {
            Ok(json) => sse_data_frame(&json),
            Err(_) => Bytes::from_static(FALLBACK_ERROR_FRAME),
        };
        Some(Substitution { frame, kind, code })
    }
}

/// Runs `guard` over `upstream` on a spawned task.
///
/// The returned stream ends after the substituted error frame. Read failures
/// are passed through as `Err`. Dropping the returned receiver stops the task
/// and drops `upstream`, which cancels the upstream read.
pub fn guard_stream(
    mut upstream: ByteStream,
    mut guard: StreamGuard,
    trace_id: Option<String>,
) -> ByteStream {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                _ = tx.closed() => {
                    debug!(event = "downstream_disconnected", trace_id = trace_id.as_deref());
                    break;
                }
                item = upstream.recv() => item,
            };
            let Some(item) = item else {
                break;
            };
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(event = "upstream_stream_failed", trace_id = trace_id.as_deref(), error = %err);
                    let _ = tx.send(Err(err)).await;
                    break;
                }
            };
            let (out, substitution) = guard.push_inspect(&chunk);
            if let Some(sub) = &substitution {
                warn!(
                    event = "stream_error_substituted",
                    trace_id = trace_id.as_deref(),
                    kind = sub.kind.map(|k| k.as_str()).unwrap_or("unclassified"),
                    code = %sub.code,
                );
            }
            if let Some(out) = out {
                if tx.send(Ok(out)).await.is_err() {
                    break;
                }
            }
            if guard.is_suppressing() {
                break;
            }
        }
    });
    rx
}
