//! Static service registry.
//!
//! # Responsibilities
//! - Hold the configured instances grouped by service id
//! - Narrow candidates by routing hint
//! - Apply the service's selection strategy

use std::collections::HashMap;

use crate::config::{ClientConfig, LoadBalancerConfig};
use crate::load_balancer::{
    instance::ServiceInstance, properties::DEFAULT_HINT, random::RandomChoice, round_robin::RoundRobin,
    LoadBalancerClient, LoadBalancerRequest, SelectionStrategy,
};

/// Metadata key compared against the request hint.
pub const HINT_METADATA_KEY: &str = "hint";

#[derive(Debug)]
struct ServiceGroup {
    instances: Vec<ServiceInstance>,
    strategy: Box<dyn SelectionStrategy>,
}

/// Load balancer over the `services` section of the configuration.
#[derive(Debug)]
pub struct StaticLoadBalancer {
    groups: HashMap<String, ServiceGroup>,
    properties: LoadBalancerConfig,
}

impl StaticLoadBalancer {
    /// Create a load balancer from configuration.
    pub fn new(config: &ClientConfig) -> Self {
        let mut groups = HashMap::new();
        for (service_id, instances) in &config.services {
            let instances: Vec<_> = instances
                .iter()
                .map(|c| ServiceInstance::from_config(service_id, c))
                .collect();
            let strategy = strategy_for(&config.loadbalancer.properties(service_id).strategy);
            tracing::debug!(service_id = %service_id, instances = instances.len(), "Registered service");
            groups.insert(service_id.clone(), ServiceGroup { instances, strategy });
        }

        Self {
            groups,
            properties: config.loadbalancer.clone(),
        }
    }

    /// All configured instances of `service_id`.
    pub fn instances(&self, service_id: &str) -> &[ServiceInstance] {
        self.groups
            .get(service_id)
            .map(|g| g.instances.as_slice())
            .unwrap_or(&[])
    }

    /// The hint in effect: the request header overrides the derived hint.
    fn effective_hint<'a>(&self, service_id: &str, request: &'a LoadBalancerRequest) -> &'a str {
        let header = &self.properties.properties(service_id).hint_header_name;
        request
            .data
            .headers
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(request.hint.as_str())
    }
}

fn strategy_for(name: &str) -> Box<dyn SelectionStrategy> {
    match name {
        "random" => Box::new(RandomChoice::new()),
        _ => Box::new(RoundRobin::new()),
    }
}

/// Instances whose hint metadata matches, or all of them when none match.
fn filter_by_hint<'a>(instances: &'a [ServiceInstance], hint: &str) -> Vec<&'a ServiceInstance> {
    if hint != DEFAULT_HINT {
        let matching: Vec<_> = instances
            .iter()
            .filter(|i| i.metadata.get(HINT_METADATA_KEY).map(String::as_str) == Some(hint))
            .collect();
        if !matching.is_empty() {
            return matching;
        }
    }
    instances.iter().collect()
}

impl LoadBalancerClient for StaticLoadBalancer {
    fn choose(&self, service_id: &str, request: &LoadBalancerRequest) -> Option<ServiceInstance> {
        let Some(group) = self.groups.get(service_id) else {
            tracing::debug!(service_id = %service_id, "Service not found in registry");
            return None;
        };

        let hint = self.effective_hint(service_id, request);
        let candidates = filter_by_hint(&group.instances, hint);
        let chosen = group.strategy.select(&candidates).cloned();
        if chosen.is_none() {
            tracing::debug!(service_id = %service_id, hint = %hint, "No instances available");
        }
        chosen
    }
}
