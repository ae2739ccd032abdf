use std::io;

use bytes::Bytes;

use crate::headers::{Headers, header_get};

/// Upstream body chunks. A read failure is delivered as `Err` and ends the stream;
/// dropping the receiver cancels the upstream read.
pub type ByteStream = tokio::sync::mpsc::Receiver<Result<Bytes, io::Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

impl UpstreamHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        header_get(&self.headers, "content-type")
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

impl UpstreamTransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamTransportErrorKind::Timeout => "timeout",
            UpstreamTransportErrorKind::ReadTimeout => "read_timeout",
            UpstreamTransportErrorKind::Connect => "connect",
            UpstreamTransportErrorKind::Dns => "dns",
            UpstreamTransportErrorKind::Tls => "tls",
            UpstreamTransportErrorKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// Transport-level failures (no HTTP response).
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// Failure building the outbound request before anything was sent.
    Request(String),
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamFailure::Transport { kind, message } => {
                write!(f, "upstream transport error ({}): {message}", kind.as_str())
            }
            UpstreamFailure::Request(message) => write!(f, "invalid upstream request: {message}"),
        }
    }
}

impl std::error::Error for UpstreamFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let mut resp = UpstreamHttpResponse {
            status: 204,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: UpstreamBody::Bytes(Bytes::new()),
        };
        assert!(resp.is_success());
        assert_eq!(resp.content_type(), Some("application/json"));
        resp.status = 429;
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn byte_stream_carries_read_errors() {
        let (tx, mut rx): (_, ByteStream) = tokio::sync::mpsc::channel(2);
        tx.send(Err(io::Error::other("reset"))).await.unwrap();
        drop(tx);
        let item = rx.recv().await.unwrap();
        assert_eq!(item.unwrap_err().to_string(), "reset");
        assert!(rx.recv().await.is_none());
    }
}
