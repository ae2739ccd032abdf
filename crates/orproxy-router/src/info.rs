use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ServiceInfo {
    name: &'static str,
    description: &'static str,
    endpoints: Vec<EndpointInfo>,
    usage: Vec<UsageNote>,
}

#[derive(Debug, Serialize)]
struct EndpointInfo {
    path: &'static str,
    methods: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct UsageNote {
    topic: &'static str,
    note: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    (
        "/v1/chat/completions",
        "POST",
        "OpenAI-compatible chat completions",
    ),
    ("/v1/api/chat", "POST", "Ollama-compatible chat"),
    ("/v1/models", "GET", "Upstream model listing (no API key required)"),
    ("/health", "GET", "Health check"),
];

const USAGE: &[(&str, &str)] = &[
    (
        "api_key",
        "Send your OpenRouter API key as `Authorization: Bearer <key>`; it is used for the upstream call.",
    ),
    (
        "model_selection",
        "The model comes from the `model` query parameter, then the body `model` field, then the proxy default.",
    ),
    (
        "model_format",
        "Use vendor-qualified ids such as openai/gpt-4o, google/gemini-pro or anthropic/claude-3-opus.",
    ),
    (
        "vendor_prefix",
        "Names without a `/` get an `openai/` prefix, so gpt-4 becomes openai/gpt-4.",
    ),
    ("streaming", "Set `\"stream\": true` in the body for server-sent events."),
    (
        "example",
        "curl -H \"Authorization: Bearer $OPENROUTER_API_KEY\" -H \"Content-Type: application/json\" \
         -d '{\"model\":\"google/gemini-pro\",\"messages\":[{\"role\":\"user\",\"content\":\"hello\"}]}' \
         http://localhost:8787/v1/chat/completions",
    ),
];

pub(crate) async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "orproxy",
        description: "OpenAI and Ollama compatible chat completions, streamed or not, served through OpenRouter.",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(path, methods, description)| EndpointInfo {
                path,
                methods,
                description,
            })
            .collect(),
        usage: USAGE
            .iter()
            .map(|&(topic, note)| UsageNote { topic, note })
            .collect(),
    })
}
