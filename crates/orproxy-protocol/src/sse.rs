use bytes::Bytes;

pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

/// Wraps a payload as one `data: <payload>\n\n` frame.
///
/// Raw line breaks inside the payload would end the frame early, so they are
/// written as the two-character escape `\n`.
pub fn sse_data_frame(payload: &str) -> Bytes {
    let payload = payload.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n");
    let mut data = Vec::with_capacity(payload.len() + 8);
    data.extend_from_slice(b"data: ");
    data.extend_from_slice(payload.as_bytes());
    data.extend_from_slice(b"\n\n");
    Bytes::from(data)
}
