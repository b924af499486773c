//! Per-service load balancer properties and observer registry.

use std::sync::Arc;

use crate::config::{ClientConfig, LoadBalancerConfig, LoadBalancerProperties};
use crate::load_balancer::lifecycle::{LoadBalancerLifecycle, LoggingLifecycle, MetricsLifecycle};

/// Hint used when neither the service nor "default" has one configured.
pub const DEFAULT_HINT: &str = "default";

/// Source of per-service properties and lifecycle observers.
pub trait LoadBalancerClientFactory: Send + Sync {
    fn properties(&self, service_id: &str) -> LoadBalancerProperties;

    fn lifecycles(&self, service_id: &str) -> Vec<Arc<dyn LoadBalancerLifecycle>>;
}

/// Derive the routing hint for `service_id`.
///
/// The service's own entry wins, then the "default" entry, then `"default"`.
pub fn resolve_hint(service_id: &str, properties: &LoadBalancerProperties) -> String {
    properties
        .hint
        .get(service_id)
        .or_else(|| properties.hint.get(DEFAULT_HINT))
        .cloned()
        .unwrap_or_else(|| DEFAULT_HINT.to_string())
}

/// Observers registered either for every service or for one service id.
struct Registration {
    service_id: Option<String>,
    lifecycle: Arc<dyn LoadBalancerLifecycle>,
}

/// [`LoadBalancerClientFactory`] backed by the `loadbalancer` config section.
pub struct ConfiguredClientFactory {
    config: LoadBalancerConfig,
    registrations: Vec<Registration>,
}

impl ConfiguredClientFactory {
    /// A factory with no observers.
    pub fn new(config: LoadBalancerConfig) -> Self {
        Self {
            config,
            registrations: Vec::new(),
        }
    }

    /// A factory with the built-in logging observer, plus metrics when enabled.
    pub fn from_client_config(config: &ClientConfig) -> Self {
        let factory = Self::new(config.loadbalancer.clone()).with_lifecycle(Arc::new(LoggingLifecycle));
        if config.observability.metrics_enabled {
            factory.with_lifecycle(Arc::new(MetricsLifecycle))
        } else {
            factory
        }
    }

    /// Register an observer for every service.
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn LoadBalancerLifecycle>) -> Self {
        self.registrations.push(Registration {
            service_id: None,
            lifecycle,
        });
        self
    }

    /// Register an observer for `service_id` only.
    pub fn with_service_lifecycle(
        mut self,
        service_id: impl Into<String>,
        lifecycle: Arc<dyn LoadBalancerLifecycle>,
    ) -> Self {
        self.registrations.push(Registration {
            service_id: Some(service_id.into()),
            lifecycle,
        });
        self
    }
}

impl std::fmt::Debug for ConfiguredClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredClientFactory")
            .field("config", &self.config)
            .field("lifecycles", &self.registrations.len())
            .finish()
    }
}

impl LoadBalancerClientFactory for ConfiguredClientFactory {
    fn properties(&self, service_id: &str) -> LoadBalancerProperties {
        self.config.properties(service_id).clone()
    }

    fn lifecycles(&self, service_id: &str) -> Vec<Arc<dyn LoadBalancerLifecycle>> {
        self.registrations
            .iter()
            .filter(|r| r.service_id.as_deref().map_or(true, |id| id == service_id))
            .map(|r| r.lifecycle.clone())
            .collect()
    }
}
