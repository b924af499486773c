//! Default transport on the hyper client.
//!
//! # Responsibilities
//! - Translate an [`OutboundRequest`] into a hyper request
//! - Enforce the connect and read timeouts of the options passed to each call
//! - Buffer the whole response body
//! - Follow redirects when the options ask for it
//!
//! One pooled hyper client is kept per distinct connect timeout, since the
//! connector owns that setting.
//!
//! Plain HTTP only; TLS is not configured here.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client as HyperClient},
    rt::TokioExecutor,
};

use crate::error::{FeignError, FeignResult};
use crate::http::request::{OutboundRequest, RequestOptions};
use crate::http::response::Response;
use crate::http::Client;

const MAX_REDIRECTS: usize = 5;

type PooledClient = HyperClient<HttpConnector, Full<Bytes>>;

/// Transport that performs the actual network call.
#[derive(Clone)]
pub struct HttpTransport {
    clients: Arc<DashMap<Duration, PooledClient>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with a client ready for the connect timeout of `options`.
    pub fn new(options: &RequestOptions) -> Self {
        let transport = Self {
            clients: Arc::new(DashMap::new()),
        };
        transport.client_for(options.connect_timeout);
        transport
    }

    /// The pooled client whose connector uses `connect_timeout`.
    fn client_for(&self, connect_timeout: Duration) -> PooledClient {
        self.clients
            .entry(connect_timeout)
            .or_insert_with(|| {
                let mut connector = HttpConnector::new();
                connector.set_connect_timeout(Some(connect_timeout));
                HyperClient::builder(TokioExecutor::new()).build(connector)
            })
            .value()
            .clone()
    }

    async fn send_once(&self, request: &OutboundRequest, options: &RequestOptions) -> FeignResult<Response> {
        let uri: http::Uri = request
            .url()
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| FeignError::InvalidRequest(e.to_string()))?;

        let mut builder = http::Request::builder().method(request.method().clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers() {
                headers.append(name.clone(), value.clone());
            }
        }
        let hyper_request = builder
            .body(Full::new(request.body().clone()))
            .map_err(|e| FeignError::InvalidRequest(e.to_string()))?;

        let client = self.client_for(options.connect_timeout);
        let exchange = async {
            let response = client
                .request(hyper_request)
                .await
                .map_err(|e| FeignError::Transport(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| FeignError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, FeignError>((parts, bytes))
        };

        let (parts, bytes) = tokio::time::timeout(options.read_timeout, exchange)
            .await
            .map_err(|_| FeignError::Timeout {
                url: request.url().to_string(),
                after_ms: options.read_timeout.as_millis() as u64,
            })??;

        Ok(Response::new(parts.status.as_u16(), parts.headers, bytes, request.clone()))
    }
}

impl Client for HttpTransport {
    fn execute<'a>(
        &'a self,
        request: OutboundRequest,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, FeignResult<Response>> {
        Box::pin(async move {
            let mut current = request;
            let mut redirects = 0;
            loop {
                let response = self.send_once(&current, options).await?;
                if options.follow_redirects && redirects < MAX_REDIRECTS {
                    if let Some(next) = redirect_target(&current, &response) {
                        tracing::debug!(from = %current.url(), to = %next.url(), status = response.status(), "Following redirect");
                        redirects += 1;
                        current = next;
                        continue;
                    }
                }
                return Ok(response);
            }
        })
    }
}

/// The follow-up request for a redirect response, if any.
fn redirect_target(request: &OutboundRequest, response: &Response) -> Option<OutboundRequest> {
    let status = StatusCode::from_u16(response.status()).ok()?;
    if !status.is_redirection() || status == StatusCode::NOT_MODIFIED {
        return None;
    }
    let location = response.headers().get(http::header::LOCATION)?.to_str().ok()?;
    let url = request.url().join(location).ok()?;

    if status == StatusCode::SEE_OTHER && request.method() != Method::HEAD {
        let mut builder = OutboundRequest::builder(Method::GET, url.as_str());
        for (name, value) in request.headers() {
            if name != http::header::CONTENT_TYPE && name != http::header::CONTENT_LENGTH {
                builder = builder.header(name.as_str(), value.to_str().ok()?).ok()?;
            }
        }
        return builder.build().ok();
    }
    Some(request.with_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::time::Instant;

    fn response_with_location(status: u16, location: &str, request: &OutboundRequest) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::LOCATION, location.parse().unwrap());
        Response::new(status, headers, Bytes::new(), request.clone())
    }

    #[test]
    fn test_redirect_resolves_relative_location() {
        let request = OutboundRequest::builder(Method::GET, "http://10.0.0.1:8080/a/b").build().unwrap();
        let response = response_with_location(302, "/c?d=1", &request);

        let next = redirect_target(&request, &response).unwrap();
        assert_eq!(next.url().as_str(), "http://10.0.0.1:8080/c?d=1");
        assert_eq!(next.method(), &Method::GET);
    }

    #[test]
    fn test_see_other_switches_to_get() {
        let request = OutboundRequest::builder(Method::POST, "http://10.0.0.1/orders")
            .header("content-type", "application/json")
            .unwrap()
            .header("x-trace", "abc")
            .unwrap()
            .body("{}")
            .build()
            .unwrap();
        let response = response_with_location(303, "/orders/7", &request);

        let next = redirect_target(&request, &response).unwrap();
        assert_eq!(next.method(), &Method::GET);
        assert!(next.body().is_empty());
        assert!(next.headers().get("content-type").is_none());
        assert_eq!(next.headers().get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_non_redirect_is_final() {
        let request = OutboundRequest::builder(Method::GET, "http://10.0.0.1/").build().unwrap();
        let response = Response::new(200, HeaderMap::new(), Bytes::new(), request.clone());
        assert!(redirect_target(&request, &response).is_none());
    }

    #[tokio::test]
    async fn test_connect_timeout_comes_from_call_options() {
        let transport = HttpTransport::new(&RequestOptions::default());
        assert_eq!(transport.clients.len(), 1);

        let options = RequestOptions {
            connect_timeout: Duration::from_millis(100),
            ..RequestOptions::default()
        };
        // Non-routable address: either refused at once or cut off by the connect timeout.
        let request = OutboundRequest::builder(Method::GET, "http://10.255.255.1:81/").build().unwrap();
        let started = Instant::now();
        let err = transport.execute(request, &options).await.unwrap_err();

        assert!(matches!(err, FeignError::Transport(_)), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.clients.len(), 2);
        assert!(transport.clients.contains_key(&Duration::from_millis(100)));
    }
}
