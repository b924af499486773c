//! Load balancer lifecycle observation.
//!
//! Observers are notified around every load-balanced call:
//! ```text
//! on_start            before an instance is chosen
//! on_start_request    after a successful choose, before delegation
//! on_complete         exactly once, with SUCCESS / DISCARD / FAILED
//! ```
//! Observers never influence control flow.

use std::any::TypeId;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, StatusCode};

use crate::error::FeignError;
use crate::http::Response;
use crate::load_balancer::{instance::ServiceInstance, LoadBalancerRequest, RequestData};
use crate::observability::metrics;

/// Outcome reported to [`LoadBalancerLifecycle::on_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The delegate returned a response.
    Success,
    /// No instance was available; nothing was sent.
    Discard,
    /// The call failed after selection.
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Success => "success",
            CompletionStatus::Discard => "discard",
            CompletionStatus::Failed => "failed",
        }
    }
}

/// Response details surfaced to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    /// Registered status, absent for codes outside the known range.
    pub http_status: Option<StatusCode>,
    /// Raw status code, present only when raw codes are enabled for the service.
    pub raw_status: Option<u16>,
    pub headers: HeaderMap,
    pub request: RequestData,
}

impl ResponseData {
    pub fn from_response(response: &Response, use_raw_status_code: bool) -> Self {
        Self {
            http_status: StatusCode::from_u16(response.status()).ok(),
            raw_status: use_raw_status_code.then_some(response.status()),
            headers: response.headers().clone(),
            request: RequestData::from(response.request()),
        }
    }
}

/// Everything known about a finished load-balanced call.
#[derive(Debug)]
pub struct CompletionContext<'a> {
    pub status: CompletionStatus,
    pub request: &'a LoadBalancerRequest,
    pub instance: Option<&'a ServiceInstance>,
    pub response: Option<&'a ResponseData>,
    pub error: Option<&'a FeignError>,
    pub elapsed: Duration,
}

/// Observer of load-balanced calls.
pub trait LoadBalancerLifecycle: Send + Sync {
    /// Whether this observer handles the given (request context, response data,
    /// server) type triple.
    fn supports(&self, _request_context: TypeId, _response: TypeId, _server: TypeId) -> bool {
        true
    }

    fn on_start(&self, _request: &LoadBalancerRequest) {}

    fn on_start_request(&self, _request: &LoadBalancerRequest, _instance: &ServiceInstance) {}

    fn on_complete(&self, completion: &CompletionContext<'_>);
}

/// Keep only observers that accept the executor's data types.
pub fn supported_lifecycles(
    lifecycles: Vec<Arc<dyn LoadBalancerLifecycle>>,
) -> Vec<Arc<dyn LoadBalancerLifecycle>> {
    lifecycles
        .into_iter()
        .filter(|l| {
            l.supports(
                TypeId::of::<LoadBalancerRequest>(),
                TypeId::of::<ResponseData>(),
                TypeId::of::<ServiceInstance>(),
            )
        })
        .collect()
}

/// Emits tracing events for every call.
#[derive(Debug, Default)]
pub struct LoggingLifecycle;

impl LoadBalancerLifecycle for LoggingLifecycle {
    fn on_start(&self, request: &LoadBalancerRequest) {
        tracing::debug!(
            method = %request.data.method,
            url = %request.data.url,
            hint = %request.hint,
            "Load-balanced call starting"
        );
    }

    fn on_start_request(&self, request: &LoadBalancerRequest, instance: &ServiceInstance) {
        tracing::debug!(
            url = %request.data.url,
            instance = %instance.instance_id,
            "Instance selected"
        );
    }

    fn on_complete(&self, completion: &CompletionContext<'_>) {
        let instance = completion.instance.map(|i| i.instance_id.as_str()).unwrap_or("none");
        match completion.status {
            CompletionStatus::Failed => tracing::warn!(
                url = %completion.request.data.url,
                instance = %instance,
                elapsed_ms = completion.elapsed.as_millis() as u64,
                error = ?completion.error,
                "Load-balanced call failed"
            ),
            status => tracing::debug!(
                url = %completion.request.data.url,
                instance = %instance,
                status = status.as_str(),
                http_status = ?completion.response.and_then(|r| r.http_status),
                elapsed_ms = completion.elapsed.as_millis() as u64,
                "Load-balanced call completed"
            ),
        }
    }
}

/// Records request counters and latency histograms.
#[derive(Debug, Default)]
pub struct MetricsLifecycle;

impl LoadBalancerLifecycle for MetricsLifecycle {
    fn on_complete(&self, completion: &CompletionContext<'_>) {
        let service_id = completion.request.data.url.host_str().unwrap_or("unknown");
        metrics::record_lb_request(service_id, completion.status.as_str(), completion.elapsed);
    }
}

/// Owns the obligation to notify completion.
///
/// `complete` fires the observers once; if the guard is dropped unresolved
/// (cancellation or panic) it reports FAILED instead.
pub(crate) struct CompletionGuard {
    lifecycles: Vec<Arc<dyn LoadBalancerLifecycle>>,
    request: LoadBalancerRequest,
    instance: Option<ServiceInstance>,
    started: Instant,
    completed: bool,
}

impl CompletionGuard {
    pub(crate) fn new(lifecycles: Vec<Arc<dyn LoadBalancerLifecycle>>, request: LoadBalancerRequest) -> Self {
        Self {
            lifecycles,
            request,
            instance: None,
            started: Instant::now(),
            completed: false,
        }
    }

    pub(crate) fn request(&self) -> &LoadBalancerRequest {
        &self.request
    }

    /// Record the chosen instance and notify `on_start_request`.
    pub(crate) fn selected(&mut self, instance: ServiceInstance) {
        for lifecycle in &self.lifecycles {
            lifecycle.on_start_request(&self.request, &instance);
        }
        self.instance = Some(instance);
    }

    pub(crate) fn complete(
        mut self,
        status: CompletionStatus,
        response: Option<&ResponseData>,
        error: Option<&FeignError>,
    ) {
        self.fire(status, response, error);
    }

    fn fire(&mut self, status: CompletionStatus, response: Option<&ResponseData>, error: Option<&FeignError>) {
        if self.completed {
            return;
        }
        self.completed = true;

        let completion = CompletionContext {
            status,
            request: &self.request,
            instance: self.instance.as_ref(),
            response,
            error,
            elapsed: self.started.elapsed(),
        };
        for lifecycle in &self.lifecycles {
            lifecycle.on_complete(&completion);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            let abandoned = FeignError::generic_invocation();
            self.fire(CompletionStatus::Failed, None, Some(&abandoned));
        }
    }
}
