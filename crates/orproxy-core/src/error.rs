use bytes::Bytes;
use http::StatusCode;
use serde_json::json;

pub const CREDENTIAL_DOCS_URL: &str = "https://openrouter.ai/keys";

/// A response the pipeline gives up with before (or instead of) talking upstream.
#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProxyError {
    pub fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body: Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
        }
    }

    /// Pre-flight rejection: no usable credential on a route that needs one.
    pub fn invalid_credential() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            json!({
                "error": {
                    "message": "Missing or invalid OpenRouter API key. Send your key as \
                        `Authorization: Bearer <key>`, or configure OPENROUTER_API_KEY on the proxy.",
                    "type": "auth_error",
                    "code": 401,
                    "docs": CREDENTIAL_DOCS_URL,
                }
            }),
        )
    }

    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "proxy request failed",
                "message": message.into(),
            }),
        )
    }
}

/// Failure taxonomy shared by the buffered and streaming paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest { region_unsupported: bool },
    InvalidCredential,
    InsufficientCredit,
    ContentModerated,
    ModelNotFound,
    RequestTimeout,
    RateLimited,
    UpstreamModelDown,
    NoProviderAvailable,
    ResponseParseFailure,
    ProcessingPlaceholder,
    TransportFailure,
}

impl ErrorKind {
    /// Canonical status used as the error `code` when the upstream gave none.
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest { .. } => 400,
            ErrorKind::InvalidCredential => 401,
            ErrorKind::InsufficientCredit => 402,
            ErrorKind::ContentModerated => 403,
            ErrorKind::ModelNotFound => 404,
            ErrorKind::RequestTimeout => 408,
            ErrorKind::RateLimited => 429,
            ErrorKind::UpstreamModelDown => 502,
            ErrorKind::NoProviderAvailable => 503,
            ErrorKind::ResponseParseFailure => 502,
            ErrorKind::ProcessingPlaceholder => 202,
            ErrorKind::TransportFailure => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest {
                region_unsupported: true,
            } => "region_unsupported",
            ErrorKind::BadRequest { .. } => "bad_request",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::InsufficientCredit => "insufficient_credit",
            ErrorKind::ContentModerated => "content_moderated",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamModelDown => "upstream_model_down",
            ErrorKind::NoProviderAvailable => "no_provider_available",
            ErrorKind::ResponseParseFailure => "response_parse_failure",
            ErrorKind::ProcessingPlaceholder => "processing_placeholder",
            ErrorKind::TransportFailure => "transport_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credential_is_401_with_docs_pointer() {
        let err = ProxyError::invalid_credential();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&err.body).unwrap();
        assert_eq!(body["error"]["code"], json!(401));
        assert_eq!(body["error"]["docs"], json!(CREDENTIAL_DOCS_URL));
    }

    #[test]
    fn transport_failure_is_500() {
        let err = ProxyError::transport_failure("connection refused");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(&err.body).unwrap();
        assert_eq!(body["message"], json!("connection refused"));
    }
}
