use bytes::Bytes;

use orproxy_common::ProxyConfig;
use orproxy_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use orproxy_provider_core::{
    Headers, HttpMethod, UpstreamFailure, UpstreamHttpRequest, header_set,
};

/// Every chat-style inbound path lands on `{base_url}/chat/completions`.
pub fn build_chat_request(
    config: &ProxyConfig,
    body: &CreateChatCompletionRequestBody,
    credential: Option<&str>,
    referer_hint: Option<&str>,
) -> Result<UpstreamHttpRequest, UpstreamFailure> {
    let payload = body
        .to_vec()
        .map_err(|err| UpstreamFailure::Request(format!("encode body: {err}")))?;
    let mut headers = identification_headers(config, credential, referer_hint);
    header_set(&mut headers, "Content-Type", "application/json");
    Ok(UpstreamHttpRequest {
        method: HttpMethod::Post,
        url: config.chat_completions_url(),
        headers,
        body: Some(Bytes::from(payload)),
        is_stream: body.is_stream(),
    })
}

pub fn build_models_request(
    config: &ProxyConfig,
    credential: Option<&str>,
    referer_hint: Option<&str>,
) -> UpstreamHttpRequest {
    let mut headers = identification_headers(config, credential, referer_hint);
    header_set(&mut headers, "Accept", "application/json");
    UpstreamHttpRequest {
        method: HttpMethod::Get,
        url: config.models_url(),
        headers,
        body: None,
        is_stream: false,
    }
}

fn identification_headers(
    config: &ProxyConfig,
    credential: Option<&str>,
    referer_hint: Option<&str>,
) -> Headers {
    let mut headers: Headers = Vec::new();
    if let Some(credential) = credential.filter(|value| !value.is_empty()) {
        header_set(&mut headers, "Authorization", format!("Bearer {credential}"));
    }
    let referer = referer_hint
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(config.default_referer.as_str());
    header_set(&mut headers, "HTTP-Referer", referer);
    header_set(&mut headers, "X-Title", config.app_title.as_str());
    headers
}
