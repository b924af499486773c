//! Response model returned by every [`Client`](crate::http::Client).

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::http::request::OutboundRequest;

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    request: OutboundRequest,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMap, body: Bytes, request: OutboundRequest) -> Self {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string);
        Self {
            status,
            reason,
            headers,
            body,
            request,
        }
    }

    /// A plain-text response synthesized locally rather than received.
    pub fn synthesized(status: StatusCode, message: &str, request: OutboundRequest) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(status.as_u16(), headers, Bytes::from(message.to_string()), request)
    }

    /// The raw status code, which may be outside the registered range.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The request that produced this response.
    pub fn request(&self) -> &OutboundRequest {
        &self.request
    }
}
