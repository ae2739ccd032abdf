//! Upstream abstractions for orproxy.
//!
//! This crate intentionally does **not** depend on axum or any concrete HTTP client.
//! The core builds `UpstreamHttpRequest` values; an `UpstreamClient` in a higher
//! layer performs the IO and hands back `UpstreamHttpResponse`.

pub mod headers;
pub mod provider;

pub use headers::{Headers, header_get, header_set};
pub use provider::{
    ByteStream, HttpMethod, UpstreamBody, UpstreamFailure, UpstreamHttpRequest,
    UpstreamHttpResponse, UpstreamTransportErrorKind,
};
