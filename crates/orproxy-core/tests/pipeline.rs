use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::{Value, json};

use orproxy_common::ProxyConfig;
use orproxy_core::{
    ChatCall, ClientResponseSchema, ModelsCall, ProxyEngine, ProxyResponse, UpstreamClient,
};
use orproxy_provider_core::{
    ByteStream, HttpMethod, UpstreamBody, UpstreamFailure, UpstreamHttpRequest,
    UpstreamHttpResponse, UpstreamTransportErrorKind, header_get,
};

enum Reply {
    Body(u16, &'static str),
    Chunks(Vec<&'static str>),
    Unreachable,
}

struct FakeUpstream {
    reply: Reply,
    seen: Mutex<Vec<UpstreamHttpRequest>>,
}

impl FakeUpstream {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<UpstreamHttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl UpstreamClient for FakeUpstream {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            self.seen.lock().unwrap().push(req);
            match &self.reply {
                Reply::Body(status, body) => Ok(UpstreamHttpResponse {
                    status: *status,
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body: UpstreamBody::Bytes(Bytes::from_static(body.as_bytes())),
                }),
                Reply::Chunks(chunks) => {
                    let (tx, rx) = tokio::sync::mpsc::channel(chunks.len() + 1);
                    for chunk in chunks {
                        tx.try_send(Ok(Bytes::from_static(chunk.as_bytes()))).unwrap();
                    }
                    Ok(UpstreamHttpResponse {
                        status: 200,
                        headers: vec![(
                            "content-type".to_string(),
                            "text/event-stream".to_string(),
                        )],
                        body: UpstreamBody::Stream(rx),
                    })
                }
                Reply::Unreachable => Err(UpstreamFailure::Transport {
                    kind: UpstreamTransportErrorKind::Connect,
                    message: "connection refused".to_string(),
                }),
            }
        })
    }
}

fn engine(upstream: Arc<FakeUpstream>, default_credential: Option<&str>) -> ProxyEngine {
    let config = ProxyConfig {
        default_credential: default_credential.map(str::to_string),
        ..ProxyConfig::default()
    };
    ProxyEngine::new(Arc::new(config), upstream)
}

fn chat(body: &str) -> ChatCall {
    ChatCall {
        trace_id: Some("test-trace".to_string()),
        schema: ClientResponseSchema::OpenAICompatible,
        path: "/v1/chat/completions".to_string(),
        model_param: None,
        authorization: Some("Bearer sk-or-v1-client-0123456789".to_string()),
        origin: None,
        body: Some(Bytes::copy_from_slice(body.as_bytes())),
    }
}

fn json_body(resp: &ProxyResponse) -> Value {
    match resp {
        ProxyResponse::Json { body, .. } => serde_json::from_slice(body).unwrap(),
        ProxyResponse::Stream { .. } => panic!("expected a JSON response"),
    }
}

async fn drain(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.recv().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn missing_credential_is_rejected_before_upstream() {
    let upstream = FakeUpstream::new(Reply::Body(200, "{}"));
    let engine = engine(upstream.clone(), None);
    let mut call = chat(r#"{"messages":[]}"#);
    call.authorization = None;
    let err = engine.handle_chat(call).await.unwrap_err();
    assert_eq!(err.status.as_u16(), 401);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn placeholder_credential_is_rejected() {
    let upstream = FakeUpstream::new(Reply::Body(200, "{}"));
    let engine = engine(upstream.clone(), None);
    let mut call = chat(r#"{"messages":[]}"#);
    call.authorization = Some("Bearer any-value".to_string());
    let err = engine.handle_chat(call).await.unwrap_err();
    assert_eq!(err.status.as_u16(), 401);
    let body: Value = serde_json::from_slice(&err.body).unwrap();
    assert_eq!(body["error"]["docs"], json!("https://openrouter.ai/keys"));
}

#[tokio::test]
async fn request_is_rewritten_and_forwarded() {
    let upstream = FakeUpstream::new(Reply::Body(
        200,
        r#"{"id":"gen-1","object":"chat.completion","choices":[]}"#,
    ));
    let engine = engine(upstream.clone(), None);
    let mut call = chat(r#"{"model":"gpt-4","messages":[{"role":"user","content":"hi"}],"temperature":0.2}"#);
    call.origin = Some("https://chat.example".to_string());
    let resp = engine.handle_chat(call).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(&resp)["id"], json!("gen-1"));

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(req.url, "https://openrouter.ai/api/v1/chat/completions");
    assert_eq!(
        header_get(&req.headers, "authorization"),
        Some("Bearer sk-or-v1-client-0123456789")
    );
    assert_eq!(header_get(&req.headers, "http-referer"), Some("https://chat.example"));
    let sent: Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["model"], json!("openai/gpt-4"));
    assert_eq!(sent["temperature"], json!(0.2));
}

#[tokio::test]
async fn query_model_wins_and_default_credential_is_used() {
    let upstream = FakeUpstream::new(Reply::Body(200, r#"{"choices":[]}"#));
    let engine = engine(upstream.clone(), Some("sk-or-v1-env-0123456789"));
    let mut call = chat(r#"{"model":"gpt-4"}"#);
    call.authorization = None;
    call.model_param = Some("google/gemini-pro".to_string());
    engine.handle_chat(call).await.unwrap();

    let req = &upstream.requests()[0];
    assert_eq!(
        header_get(&req.headers, "authorization"),
        Some("Bearer sk-or-v1-env-0123456789")
    );
    let sent: Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["model"], json!("google/gemini-pro"));
}

#[tokio::test]
async fn bodyless_request_uses_default_model() {
    let upstream = FakeUpstream::new(Reply::Body(200, r#"{"choices":[]}"#));
    let engine = engine(upstream.clone(), None);
    let mut call = chat("");
    call.body = None;
    engine.handle_chat(call).await.unwrap();
    let sent: Value =
        serde_json::from_slice(upstream.requests()[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(sent, json!({"model": "deepseek/deepseek-r1-zero:free"}));
}

#[tokio::test]
async fn upstream_rate_limit_is_reported_as_200_completion() {
    let upstream = FakeUpstream::new(Reply::Body(429, r#"{"error":{"message":"rate limited"}}"#));
    let engine = engine(upstream, None);
    let resp = engine
        .handle_chat(chat(r#"{"model":"openai/gpt-4","messages":[]}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = json_body(&resp);
    assert_eq!(body["object"], json!("chat.completion"));
    assert_eq!(body["choices"][0]["finish_reason"], json!("stop"));
    let content = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(content.contains("429"));
    assert!(content.to_lowercase().contains("rate limit"));
}

#[tokio::test]
async fn ollama_path_backfills_missing_fields() {
    let upstream = FakeUpstream::new(Reply::Body(
        200,
        r#"{"model":"openai/gpt-4","choices":[{"message":{"role":"assistant","content":"hey"}}]}"#,
    ));
    let engine = engine(upstream, None);
    let mut call = chat(r#"{"model":"gpt-4"}"#);
    call.schema = ClientResponseSchema::OllamaCompatible;
    call.path = "/v1/api/chat".to_string();
    let body = json_body(&engine.handle_chat(call).await.unwrap());
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["object"], json!("chat.completion"));
    assert!(body["created"].is_i64());
    assert_eq!(body["usage"]["total_tokens"], json!(0));
    assert_eq!(body["choices"][0]["message"]["content"], json!("hey"));
}

#[tokio::test]
async fn clean_stream_is_passed_through() {
    let chunks = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n",
        "data: [DONE]\n\n",
    ];
    let upstream = FakeUpstream::new(Reply::Chunks(chunks.clone()));
    let engine = engine(upstream, None);
    let resp = engine
        .handle_chat(chat(r#"{"model":"openai/gpt-4","stream":true}"#))
        .await
        .unwrap();
    let ProxyResponse::Stream { status, body } = resp else {
        panic!("expected a stream");
    };
    assert_eq!(status, 200);
    assert_eq!(drain(body).await, chunks.concat().into_bytes());
}

#[tokio::test]
async fn stream_error_is_substituted_with_one_frame() {
    let upstream = FakeUpstream::new(Reply::Chunks(vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
        "data: {\"error\":{\"code\":429,\"message\":\"quota exceeded\"}}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
        "data: [DONE]\n\n",
    ]));
    let engine = engine(upstream, None);
    let resp = engine
        .handle_chat(chat(r#"{"model":"openai/gpt-4","stream":true}"#))
        .await
        .unwrap();
    let ProxyResponse::Stream { body, .. } = resp else {
        panic!("expected a stream");
    };
    let out = String::from_utf8(drain(body).await).unwrap();
    let frames: Vec<&str> = out.split_terminator("\n\n").collect();
    assert_eq!(frames.len(), 2);
    let payload: Value = serde_json::from_str(frames[1].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(payload["error"]["code"], json!("429"));
    assert!(!out.contains("[DONE]"));
    assert!(!out.contains("\"B\""));
}

#[tokio::test]
async fn stream_request_rejected_upstream_gets_json_error() {
    let upstream = FakeUpstream::new(Reply::Body(
        404,
        r#"{"error":{"message":"No endpoints found for openai/gpt-9"}}"#,
    ));
    let engine = engine(upstream, None);
    let resp = engine
        .handle_chat(chat(r#"{"model":"openai/gpt-9","stream":true}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = json_body(&resp);
    assert_eq!(body["error"]["code"], json!("404"));
    assert_eq!(body["error"]["model"], json!("openai/gpt-9"));
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("openai/gpt-9")
    );
}

#[tokio::test]
async fn transport_failure_is_500() {
    let upstream = FakeUpstream::new(Reply::Unreachable);
    let engine = engine(upstream, None);
    let err = engine
        .handle_chat(chat(r#"{"messages":[]}"#))
        .await
        .unwrap_err();
    assert_eq!(err.status.as_u16(), 500);
    let body: Value = serde_json::from_slice(&err.body).unwrap();
    assert_eq!(body["error"], json!("proxy request failed"));
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn models_listing_needs_no_credential() {
    let upstream = FakeUpstream::new(Reply::Body(200, r#"{"data":[{"id":"openai/gpt-4"}]}"#));
    let engine = engine(upstream.clone(), None);
    let resp = engine.handle_models(ModelsCall::default()).await.unwrap();
    assert_eq!(json_body(&resp)["data"][0]["id"], json!("openai/gpt-4"));
    let req = &upstream.requests()[0];
    assert_eq!(req.method, HttpMethod::Get);
    assert_eq!(req.url, "https://openrouter.ai/api/v1/models");
    assert_eq!(header_get(&req.headers, "authorization"), None);
}
