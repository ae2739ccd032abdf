use bytes::Bytes;

use orproxy_provider_core::ByteStream;

use crate::normalize::ClientResponseSchema;

/// One inbound chat-style request, as the router saw it.
#[derive(Debug, Clone)]
pub struct ChatCall {
    pub trace_id: Option<String>,
    pub schema: ClientResponseSchema,
    pub path: String,
    /// `?model=` query parameter.
    pub model_param: Option<String>,
    pub authorization: Option<String>,
    /// `Origin` header, forwarded upstream as the referer.
    pub origin: Option<String>,
    /// `None` when the method carries no body (body parsing is skipped).
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelsCall {
    pub trace_id: Option<String>,
    pub authorization: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug)]
pub enum ProxyResponse {
    Json { status: u16, body: Bytes },
    Stream { status: u16, body: ByteStream },
}

impl ProxyResponse {
    pub fn status(&self) -> u16 {
        match self {
            ProxyResponse::Json { status, .. } | ProxyResponse::Stream { status, .. } => *status,
        }
    }
}
