//! HTTP request/response model and the transport seam.
//!
//! # Data Flow
//! ```text
//! method handler builds OutboundRequest (logical host = service id)
//!     → Client::execute (retry decorator, optional)
//!     → Client::execute (load-balanced executor rewrites the URL)
//!     → Client::execute (transport.rs performs the network call)
//!     → Response (fully buffered)
//! ```
//!
//! Every layer implements the same [`Client`] trait so they stack freely.

pub mod request;
pub mod response;
pub mod transport;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::FeignResult;

pub use request::{OutboundRequest, OutboundRequestBuilder, RequestOptions};
pub use response::Response;
pub use transport::HttpTransport;

/// Executes an outbound request.
pub trait Client: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: OutboundRequest,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, FeignResult<Response>>;
}

impl<C: Client + ?Sized> Client for Arc<C> {
    fn execute<'a>(
        &'a self,
        request: OutboundRequest,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, FeignResult<Response>> {
        (**self).execute(request, options)
    }
}
