//! Outbound request model.
//!
//! A request is immutable once built. Rewriting the target produces a copy
//! that differs only in its URL.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::{FeignError, FeignResult};

/// An HTTP request addressed either to a logical service or a concrete instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    charset: Option<String>,
}

impl OutboundRequest {
    /// Start building a request for `method` and `url`.
    pub fn builder(method: Method, url: &str) -> OutboundRequestBuilder {
        OutboundRequestBuilder {
            method,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            charset: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// A copy of this request pointing at `url`.
    pub fn with_url(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }
}

/// Builder for [`OutboundRequest`].
#[derive(Debug)]
pub struct OutboundRequestBuilder {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    charset: Option<String>,
}

impl OutboundRequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> FeignResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FeignError::InvalidRequest(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FeignError::InvalidRequest(format!("header value for '{}': {}", name, e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn build(self) -> FeignResult<OutboundRequest> {
        let url = Url::parse(&self.url)
            .map_err(|e| FeignError::InvalidRequest(format!("url '{}': {}", self.url, e)))?;
        Ok(OutboundRequest {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            charset: self.charset,
        })
    }
}

/// Per-call transport options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for RequestOptions {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_ms),
            read_timeout: Duration::from_millis(config.read_ms),
            follow_redirects: config.follow_redirects,
        }
    }
}
