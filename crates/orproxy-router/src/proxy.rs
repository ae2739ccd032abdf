use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use orproxy_core::{
    ChatCall, ClientResponseSchema, ModelsCall, ProxyEngine, ProxyError, ProxyResponse,
};
use orproxy_protocol::sse::SSE_CONTENT_TYPE;

use crate::info::service_info;

pub const REQUEST_ID_HEADER: &str = "x-orproxy-request-id";

const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";
const CORS_MAX_AGE: &str = "86400";

#[derive(Clone)]
pub struct ProxyState {
    pub engine: Arc<ProxyEngine>,
}

#[derive(Clone)]
struct RequestTraceId(String);

pub fn proxy_router(engine: Arc<ProxyEngine>) -> Router {
    let state = ProxyState { engine };

    Router::new()
        .route("/", any(service_info))
        .route("/health", any(health))
        .route("/v1/chat/completions", any(openai_chat_completions))
        .route("/v1/api/chat", any(ollama_chat))
        .route("/v1/models", get(models_list).fallback(openai_chat_completions))
        .fallback(v1_or_not_found)
        .layer(middleware::from_fn(cors_and_trace))
        .with_state(state)
}

/// Answers preflights, tags each request with a trace id, and stamps CORS
/// headers on every response, including fallbacks and errors.
async fn cors_and_trace(mut req: axum::http::Request<Body>, next: Next) -> Response {
    let trace_id = uuid::Uuid::now_v7().to_string();
    let mut resp = if req.method() == Method::OPTIONS {
        debug!(event = "preflight", trace_id = %trace_id, path = %req.uri().path());
        StatusCode::OK.into_response()
    } else {
        req.extensions_mut()
            .insert(RequestTraceId(trace_id.clone()));
        next.run(req).await
    };

    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(CORS_MAX_AGE),
    );
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    resp
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Any other path starting with `/v1` (`/v1`, `/v1/...`, `/v1beta/...`)
/// collapses onto the chat pipeline; everything else is a 404.
async fn v1_or_not_found(
    state: State<ProxyState>,
    trace_id: Extension<RequestTraceId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: RawQuery,
    body: Bytes,
) -> Response {
    if uri.path().starts_with("/v1") {
        return openai_chat_completions(state, trace_id, method, uri, headers, query, body).await;
    }
    json_response(
        StatusCode::NOT_FOUND,
        json!({ "error": "path not found", "path": uri.path() }),
    )
}

async fn openai_chat_completions(
    State(state): State<ProxyState>,
    Extension(trace_id): Extension<RequestTraceId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let call = chat_call(
        trace_id,
        ClientResponseSchema::OpenAICompatible,
        &method,
        &uri,
        &headers,
        query,
        body,
    );
    run_chat(&state, call).await
}

async fn ollama_chat(
    State(state): State<ProxyState>,
    Extension(trace_id): Extension<RequestTraceId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let call = chat_call(
        trace_id,
        ClientResponseSchema::OllamaCompatible,
        &method,
        &uri,
        &headers,
        query,
        body,
    );
    run_chat(&state, call).await
}

async fn models_list(
    State(state): State<ProxyState>,
    Extension(trace_id): Extension<RequestTraceId>,
    headers: HeaderMap,
) -> Response {
    let call = ModelsCall {
        trace_id: Some(trace_id.0),
        authorization: header_str(&headers, header::AUTHORIZATION),
        origin: header_str(&headers, header::ORIGIN),
    };
    match state.engine.handle_models(call).await {
        Ok(resp) => to_axum_response(resp),
        Err(err) => proxy_error_response(err),
    }
}

fn chat_call(
    trace_id: RequestTraceId,
    schema: ClientResponseSchema,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> ChatCall {
    let model_param = query.as_deref().and_then(first_model_param);
    ChatCall {
        trace_id: Some(trace_id.0),
        schema,
        path: uri.path().to_string(),
        model_param,
        authorization: header_str(headers, header::AUTHORIZATION),
        origin: header_str(headers, header::ORIGIN),
        body: (*method == Method::POST).then_some(body),
    }
}

/// First `model` pair wins when the key is repeated.
fn first_model_param(query: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()?
        .into_iter()
        .find_map(|(key, value)| (key == "model").then_some(value))
}

async fn run_chat(state: &ProxyState, call: ChatCall) -> Response {
    match state.engine.handle_chat(call).await {
        Ok(resp) => to_axum_response(resp),
        Err(err) => proxy_error_response(err),
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn to_axum_response(resp: ProxyResponse) -> Response {
    match resp {
        ProxyResponse::Json { status, body } => bytes_response(status_or_bad_gateway(status), body),
        ProxyResponse::Stream { status, body } => {
            let stream = ReceiverStream::new(body);
            Response::builder()
                .status(status_or_bad_gateway(status))
                .header(header::CONTENT_TYPE, SSE_CONTENT_TYPE)
                // Hint common reverse proxies to avoid buffering SSE responses.
                .header(header::CACHE_CONTROL, "no-cache")
                .header(HeaderName::from_static("x-accel-buffering"), "no")
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| {
                    (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response()
                })
        }
    }
}

fn proxy_error_response(err: ProxyError) -> Response {
    bytes_response(err.status, err.body)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

fn bytes_response(status: StatusCode, body: Bytes) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn status_or_bad_gateway(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}
