//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! OutboundRequest (host = logical service id)
//!     → executor.rs (derive service id + hint, notify lifecycle start)
//!     → registry.rs (candidate instances, filtered by hint)
//!     → Apply selection strategy:
//!         - round_robin.rs (rotate through candidates)
//!         - random.rs (uniform pick)
//!     → reconstruct_uri (logical host → instance address)
//!     → delegate transport, lifecycle completion
//! ```
//!
//! # Design Decisions
//! - Instances are resolved per call; the executor never caches them
//! - A missing instance is a 503 response, not an error
//! - Lifecycle completion fires exactly once per execute

pub mod executor;
pub mod instance;
pub mod lifecycle;
pub mod properties;
pub mod random;
pub mod registry;
pub mod round_robin;

use http::{HeaderMap, Method};
use url::Url;

use crate::error::{FeignError, FeignResult};
use crate::http::OutboundRequest;

pub use executor::LoadBalancedClient;
pub use instance::ServiceInstance;
pub use lifecycle::{
    CompletionContext, CompletionStatus, LoadBalancerLifecycle, LoggingLifecycle, MetricsLifecycle, ResponseData,
};
pub use properties::{resolve_hint, ConfiguredClientFactory, LoadBalancerClientFactory};
pub use registry::StaticLoadBalancer;

/// Picks one instance out of a candidate list.
pub trait SelectionStrategy: Send + Sync + std::fmt::Debug {
    fn select<'a>(&self, candidates: &[&'a ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Chooses instances for logical service ids.
pub trait LoadBalancerClient: Send + Sync {
    /// Choose an instance of `service_id`, or `None` if none is available.
    fn choose(&self, service_id: &str, request: &LoadBalancerRequest) -> Option<ServiceInstance>;

    /// Rewrite `original` so that it targets `instance`.
    fn reconstruct_uri(&self, instance: &ServiceInstance, original: &Url) -> FeignResult<Url> {
        reconstruct_uri(instance, original)
    }
}

/// Request metadata exposed to the load balancer and lifecycle observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl From<&OutboundRequest> for RequestData {
    fn from(request: &OutboundRequest) -> Self {
        Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// The selection request handed to [`LoadBalancerClient::choose`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerRequest {
    pub data: RequestData,
    pub hint: String,
}

impl LoadBalancerRequest {
    pub fn new(data: RequestData, hint: impl Into<String>) -> Self {
        Self {
            data,
            hint: hint.into(),
        }
    }
}

/// Replace scheme, host and port of `original` with those of `instance`.
///
/// Path, query and fragment are kept. The scheme becomes `https` when the
/// instance is secure; an `https` original stays `https`.
pub fn reconstruct_uri(instance: &ServiceInstance, original: &Url) -> FeignResult<Url> {
    let invalid = |what: &str| {
        FeignError::InvalidRequest(format!(
            "cannot rewrite {} for instance {}: invalid {}",
            original, instance.instance_id, what
        ))
    };

    let mut url = original.clone();
    let scheme = if instance.secure || original.scheme() == "https" {
        "https"
    } else {
        "http"
    };
    url.set_scheme(scheme).map_err(|_| invalid("scheme"))?;

    let host = if instance.host.contains(':') && !instance.host.starts_with('[') {
        format!("[{}]", instance.host)
    } else {
        instance.host.clone()
    };
    url.set_host(Some(&host)).map_err(|_| invalid("host"))?;
    url.set_port(Some(instance.port)).map_err(|_| invalid("port"))?;
    Ok(url)
}
