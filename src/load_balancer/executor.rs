//! Load-balanced executor.
//!
//! # Responsibilities
//! - Read the logical service id from the request authority
//! - Derive the routing hint and build the selection request
//! - Choose an instance and rewrite the request URL
//! - Delegate to the transport with lifecycle notifications around the call
//!
//! A missing instance yields a synthesized 503 response with a DISCARD
//! completion; a missing service id is a precondition failure.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::StatusCode;

use crate::error::{FeignError, FeignResult};
use crate::http::{Client, OutboundRequest, RequestOptions, Response};
use crate::load_balancer::lifecycle::{supported_lifecycles, CompletionGuard, CompletionStatus, ResponseData};
use crate::load_balancer::properties::{resolve_hint, LoadBalancerClientFactory};
use crate::load_balancer::{LoadBalancerClient, LoadBalancerRequest, RequestData, ServiceInstance};

/// [`Client`] that resolves a service instance per request.
pub struct LoadBalancedClient {
    delegate: Arc<dyn Client>,
    load_balancer: Arc<dyn LoadBalancerClient>,
    factory: Arc<dyn LoadBalancerClientFactory>,
}

impl LoadBalancedClient {
    pub fn new(
        delegate: Arc<dyn Client>,
        load_balancer: Arc<dyn LoadBalancerClient>,
        factory: Arc<dyn LoadBalancerClientFactory>,
    ) -> Self {
        Self {
            delegate,
            load_balancer,
            factory,
        }
    }

    /// The transport that performs the rewritten call.
    pub fn delegate(&self) -> &Arc<dyn Client> {
        &self.delegate
    }

    pub(crate) fn factory(&self) -> &Arc<dyn LoadBalancerClientFactory> {
        &self.factory
    }

    /// One select-and-execute pass.
    ///
    /// A `pinned` instance replaces selection. The instance the request went
    /// to, if any, is stored in `chosen`.
    pub(crate) async fn execute_on(
        &self,
        request: OutboundRequest,
        options: &RequestOptions,
        pinned: Option<ServiceInstance>,
        chosen: &mut Option<ServiceInstance>,
    ) -> FeignResult<Response> {
        let original = request.url().clone();
        let service_id = service_id_of(&request)?;

        let properties = self.factory.properties(&service_id);
        let hint = resolve_hint(&service_id, &properties);
        let lb_request = LoadBalancerRequest::new(RequestData::from(&request), hint);

        let lifecycles = supported_lifecycles(self.factory.lifecycles(&service_id));
        for lifecycle in &lifecycles {
            lifecycle.on_start(&lb_request);
        }
        let mut guard = CompletionGuard::new(lifecycles, lb_request);

        let instance = match pinned {
            Some(instance) => Some(instance),
            None => self.load_balancer.choose(&service_id, guard.request()),
        };
        let Some(instance) = instance else {
            let message = format!("Load balancer does not contain an instance for the service {}", service_id);
            tracing::warn!(service_id = %service_id, "{}", message);
            guard.complete(CompletionStatus::Discard, None, None);
            return Ok(Response::synthesized(StatusCode::SERVICE_UNAVAILABLE, &message, request));
        };

        *chosen = Some(instance.clone());
        let url = match self.load_balancer.reconstruct_uri(&instance, &original) {
            Ok(url) => url,
            Err(e) => {
                guard.selected(instance);
                guard.complete(CompletionStatus::Failed, None, Some(&e));
                return Err(e);
            }
        };
        tracing::debug!(service_id = %service_id, instance = %instance.instance_id, url = %url, "Executing load-balanced request");
        guard.selected(instance);

        match self.delegate.execute(request.with_url(url), options).await {
            Ok(response) => {
                let data = ResponseData::from_response(&response, properties.use_raw_status_code_in_response_data);
                guard.complete(CompletionStatus::Success, Some(&data), None);
                Ok(response)
            }
            Err(e) => {
                guard.complete(CompletionStatus::Failed, None, Some(&e));
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for LoadBalancedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancedClient").finish_non_exhaustive()
    }
}

/// The logical service id carried in the request authority.
pub fn service_id_of(request: &OutboundRequest) -> FeignResult<String> {
    request
        .url()
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FeignError::InvalidServiceId(request.url().to_string()))
}

impl Client for LoadBalancedClient {
    fn execute<'a>(
        &'a self,
        request: OutboundRequest,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, FeignResult<Response>> {
        Box::pin(async move { self.execute_on(request, options, None, &mut None).await })
    }
}
