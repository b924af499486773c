//! Retry decorator for the load-balanced executor.
//!
//! # Responsibilities
//! - Re-run the full select-and-execute sequence on a retryable outcome
//! - Delegate every retry-or-give-up decision to a [`RetryPolicy`]
//! - Surface the last attempt's result once the policy gives up
//!
//! # Design Decisions
//! - Same-instance retries reuse the instance of the failed attempt; the
//!   rest go back through instance selection, so a fresh instance may serve
//!   them. Both budgets add up to the attempt limit
//! - Only safe methods (GET, HEAD, OPTIONS, TRACE) are retried unless
//!   `retry_on_all_operations` is set
//! - Precondition failures are never retried
//! - Responses are retried only for the configured status codes

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::Method;

use crate::config::RetryProperties;
use crate::error::{FeignError, FeignResult};
use crate::http::{Client, OutboundRequest, RequestOptions, Response};
use crate::load_balancer::executor::service_id_of;
use crate::load_balancer::{LoadBalancedClient, LoadBalancerClient, LoadBalancerClientFactory};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// What a finished attempt produced.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    Failed(&'a FeignError),
    Status(u16),
}

/// Input to a retry decision.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// Attempts made so far, starting at 1.
    pub attempt: u32,
    pub service_id: &'a str,
    pub method: &'a Method,
    pub outcome: AttemptOutcome<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay.
    Retry(Duration),
    GiveUp,
}

/// Decides whether an attempt is repeated.
pub trait RetryPolicy: Send + Sync {
    fn decide(&self, context: &RetryContext<'_>) -> RetryDecision;

    /// Whether the retry following `attempt` reuses the instance that just served it.
    fn retry_on_same_instance(&self, _attempt: u32) -> bool {
        false
    }
}

/// Supplies the retry policy for a service, if retry is active for it.
pub trait RetryPolicyFactory: Send + Sync {
    fn policy(&self, service_id: &str) -> Option<Arc<dyn RetryPolicy>>;
}

/// Policy driven by a service's [`RetryProperties`].
#[derive(Debug, Clone)]
pub struct LoadBalancedRetryPolicy {
    properties: RetryProperties,
}

impl LoadBalancedRetryPolicy {
    pub fn new(properties: RetryProperties) -> Self {
        Self { properties }
    }

    fn can_retry(&self, method: &Method) -> bool {
        self.properties.retry_on_all_operations
            || matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
    }
}

impl RetryPolicy for LoadBalancedRetryPolicy {
    fn decide(&self, context: &RetryContext<'_>) -> RetryDecision {
        let retryable = match context.outcome {
            AttemptOutcome::Failed(e) => !e.is_precondition(),
            AttemptOutcome::Status(status) => self.properties.retryable_status_codes.contains(&status),
        };
        if !retryable || !self.can_retry(context.method) || context.attempt >= self.properties.max_attempts() {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(calculate_backoff(context.attempt, &self.properties.backoff))
    }

    fn retry_on_same_instance(&self, attempt: u32) -> bool {
        attempt <= self.properties.max_retries_on_same_service_instance
    }
}

/// Builds [`LoadBalancedRetryPolicy`] from per-service load balancer properties.
pub struct PropertiesRetryPolicyFactory {
    properties: Arc<dyn LoadBalancerClientFactory>,
}

impl PropertiesRetryPolicyFactory {
    pub fn new(properties: Arc<dyn LoadBalancerClientFactory>) -> Self {
        Self { properties }
    }
}

impl RetryPolicyFactory for PropertiesRetryPolicyFactory {
    fn policy(&self, service_id: &str) -> Option<Arc<dyn RetryPolicy>> {
        let retry = self.properties.properties(service_id).retry;
        retry
            .enabled
            .then(|| Arc::new(LoadBalancedRetryPolicy::new(retry)) as Arc<dyn RetryPolicy>)
    }
}

/// [`Client`] that repeats load-balanced calls according to a retry policy.
pub struct RetryableClient {
    delegate: Arc<LoadBalancedClient>,
    policies: Arc<dyn RetryPolicyFactory>,
}

impl RetryableClient {
    pub fn new(delegate: Arc<LoadBalancedClient>, policies: Arc<dyn RetryPolicyFactory>) -> Self {
        Self { delegate, policies }
    }

    /// Policies taken from the delegate's own load balancer properties.
    pub fn from_properties(delegate: Arc<LoadBalancedClient>) -> Self {
        let policies = Arc::new(PropertiesRetryPolicyFactory::new(delegate.factory().clone()));
        Self::new(delegate, policies)
    }

    async fn execute_with_retry(&self, request: OutboundRequest, options: &RequestOptions) -> FeignResult<Response> {
        let service_id = service_id_of(&request)?;
        let Some(policy) = self.policies.policy(&service_id) else {
            return self.delegate.execute(request, options).await;
        };

        let mut attempt = 0;
        let mut pinned = None;
        loop {
            attempt += 1;
            let mut chosen = None;
            let result = self
                .delegate
                .execute_on(request.clone(), options, pinned.take(), &mut chosen)
                .await;

            let decision = policy.decide(&RetryContext {
                attempt,
                service_id: &service_id,
                method: request.method(),
                outcome: match &result {
                    Ok(response) => AttemptOutcome::Status(response.status()),
                    Err(e) => AttemptOutcome::Failed(e),
                },
            });

            match decision {
                RetryDecision::GiveUp => return result,
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        service_id = %service_id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        outcome = ?result.as_ref().map(Response::status),
                        "Retrying load-balanced request"
                    );
                    metrics::record_retry(&service_id);
                    if policy.retry_on_same_instance(attempt) {
                        pinned = chosen;
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableClient").field("delegate", &self.delegate).finish_non_exhaustive()
    }
}

impl Client for RetryableClient {
    fn execute<'a>(
        &'a self,
        request: OutboundRequest,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, FeignResult<Response>> {
        Box::pin(self.execute_with_retry(request, options))
    }
}

/// Stack the executor over `transport`, adding the retry decorator when retry
/// is enabled in the global load balancer properties.
pub fn build_client(
    transport: Arc<dyn Client>,
    load_balancer: Arc<dyn LoadBalancerClient>,
    factory: Arc<dyn LoadBalancerClientFactory>,
    retry_enabled: bool,
) -> Arc<dyn Client> {
    let executor = Arc::new(LoadBalancedClient::new(transport, load_balancer, factory));
    if retry_enabled {
        return Arc::new(RetryableClient::from_properties(executor));
    }
    executor
}
