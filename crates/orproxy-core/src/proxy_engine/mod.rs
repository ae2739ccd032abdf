use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use orproxy_common::ProxyConfig;
use orproxy_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use orproxy_provider_core::{ByteStream, UpstreamBody};

use crate::credential::extract_credential;
use crate::error::ProxyError;
use crate::model::resolve_model;
use crate::normalize::{normalize_response, normalize_stream_rejection};
use crate::stream_guard::{StreamGuard, guard_stream};
use crate::upstream_client::UpstreamClient;
use crate::upstream_request::{build_chat_request, build_models_request};

mod types;

pub use types::{ChatCall, ModelsCall, ProxyResponse};

/// The request pipeline: resolve, authorize, build, call, then normalize or guard.
///
/// Holds no per-request state; one engine serves every request concurrently.
#[derive(Clone)]
pub struct ProxyEngine {
    config: Arc<ProxyConfig>,
    client: Arc<dyn UpstreamClient>,
}

impl ProxyEngine {
    pub fn new(config: Arc<ProxyConfig>, client: Arc<dyn UpstreamClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub async fn handle_chat(&self, call: ChatCall) -> Result<ProxyResponse, ProxyError> {
        let started = Instant::now();
        let trace_id = call.trace_id.clone();
        info!(
            event = "downstream_received",
            trace_id = trace_id.as_deref(),
            path = %call.path,
            schema = call.schema.as_str(),
            has_body = call.body.is_some(),
        );

        let mut body = call
            .body
            .as_deref()
            .map(CreateChatCompletionRequestBody::from_slice_lenient)
            .unwrap_or_default();
        let body_model = body.model().map(str::to_string);
        let model = resolve_model(
            call.model_param.as_deref(),
            body_model.as_deref(),
            &self.config.default_model,
        );
        body.set_model(model.id.clone());

        let credential = extract_credential(
            call.authorization.as_deref(),
            self.config.default_credential.as_deref(),
        );
        if !credential.is_valid() {
            warn!(
                event = "downstream_rejected",
                trace_id = trace_id.as_deref(),
                credential_source = credential.source(),
                status = 401,
            );
            return Err(ProxyError::invalid_credential());
        }

        let req = build_chat_request(
            &self.config,
            &body,
            credential.credential.as_deref(),
            call.origin.as_deref(),
        )
        .map_err(|err| ProxyError::transport_failure(err.to_string()))?;
        let is_stream = req.is_stream;
        info!(
            event = "upstream_sent",
            trace_id = trace_id.as_deref(),
            method = req.method.as_str(),
            url = %req.url,
            model = %model.id,
            model_source = model.source.as_str(),
            messages = body.messages().map_or(0, Vec::len),
            is_stream,
            credential_source = credential.source(),
            credential = %credential.masked(),
        );

        let resp = match self.client.send(req).await {
            Ok(resp) => resp,
            Err(err) => {
                error!(
                    event = "upstream_failed",
                    trace_id = trace_id.as_deref(),
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                );
                return Err(ProxyError::transport_failure(err.to_string()));
            }
        };
        let status = resp.status;
        info!(
            event = "upstream_responded",
            trace_id = trace_id.as_deref(),
            status,
            content_type = ?resp.content_type(),
            elapsed_ms = started.elapsed().as_millis() as u64,
        );

        if is_stream && resp.is_success() {
            let upstream = match resp.body {
                UpstreamBody::Stream(rx) => rx,
                UpstreamBody::Bytes(bytes) => single_chunk_stream(bytes),
            };
            let guard = StreamGuard::new(model.id.clone());
            let guarded = guard_stream(upstream, guard, trace_id.clone());
            info!(
                event = "downstream_responded",
                trace_id = trace_id.as_deref(),
                status,
                is_stream = true,
                elapsed_ms = started.elapsed().as_millis() as u64,
            );
            return Ok(ProxyResponse::Stream {
                status,
                body: guarded,
            });
        }

        let raw = collect_body(resp.body)
            .await
            .map_err(|err| ProxyError::transport_failure(err.to_string()))?;
        let text = String::from_utf8_lossy(&raw);
        let normalized = if is_stream {
            normalize_stream_rejection(&model.id, status, &text)
        } else {
            normalize_response(call.schema, &model.id, status, &text, OffsetDateTime::now_utc())
        };
        info!(
            event = "downstream_responded",
            trace_id = trace_id.as_deref(),
            status = normalized.status,
            upstream_status = status,
            kind = normalized.kind.map(|k| k.as_str()),
            is_stream = false,
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        Ok(ProxyResponse::Json {
            status: normalized.status,
            body: normalized.body,
        })
    }

    /// Models listing. Needs no credential; one is forwarded when the caller
    /// or the config has a usable one.
    pub async fn handle_models(&self, call: ModelsCall) -> Result<ProxyResponse, ProxyError> {
        let started = Instant::now();
        let credential = extract_credential(
            call.authorization.as_deref(),
            self.config.default_credential.as_deref(),
        );
        let forwarded = if credential.is_valid() {
            credential.credential.as_deref()
        } else {
            None
        };
        let req = build_models_request(&self.config, forwarded, call.origin.as_deref());
        info!(
            event = "upstream_sent",
            trace_id = call.trace_id.as_deref(),
            method = req.method.as_str(),
            url = %req.url,
            credential_source = if forwarded.is_some() { credential.source() } else { "none" },
        );

        let resp = self.client.send(req).await.map_err(|err| {
            error!(event = "upstream_failed", trace_id = call.trace_id.as_deref(), error = %err);
            ProxyError::transport_failure(err.to_string())
        })?;
        let status = resp.status;
        let body = collect_body(resp.body)
            .await
            .map_err(|err| ProxyError::transport_failure(err.to_string()))?;
        info!(
            event = "downstream_responded",
            trace_id = call.trace_id.as_deref(),
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        Ok(ProxyResponse::Json { status, body })
    }
}

async fn collect_body(body: UpstreamBody) -> Result<Bytes, io::Error> {
    match body {
        UpstreamBody::Bytes(bytes) => Ok(bytes),
        UpstreamBody::Stream(mut rx) => {
            let mut buf = BytesMut::new();
            while let Some(chunk) = rx.recv().await {
                buf.extend_from_slice(&chunk?);
            }
            Ok(buf.freeze())
        }
    }
}

fn single_chunk_stream(bytes: Bytes) -> ByteStream {
    let (tx, rx) = mpsc::channel(1);
    if !bytes.is_empty() {
        let _ = tx.try_send(Ok(bytes));
    }
    rx
}
