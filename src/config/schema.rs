//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a resilient client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Circuit breaker settings for the invocation dispatcher.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Load balancer properties, global and per service.
    pub loadbalancer: LoadBalancerConfig,

    /// Default transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Static service discovery: service id -> instances.
    pub services: HashMap<String, Vec<InstanceConfig>>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Pass the client name to the factory as a breaker group.
    pub group_enabled: bool,

    /// Breaker naming policy ("config-key" or "alphanumeric").
    pub name_resolver: String,

    /// Settings used by breakers outside any configured group.
    #[serde(flatten)]
    pub defaults: BreakerSettings,

    /// Per-group overrides, keyed by client name.
    pub groups: HashMap<String, BreakerSettings>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            group_enabled: false,
            name_resolver: "config-key".to_string(),
            defaults: BreakerSettings::default(),
            groups: HashMap::new(),
        }
    }
}

/// Thresholds for a single circuit breaker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before probing, in milliseconds.
    pub open_duration_ms: u64,

    /// Concurrent probe calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl BreakerSettings {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 10_000,
            half_open_max_calls: 1,
        }
    }
}

/// Load balancer configuration: global defaults plus per-service overrides.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Properties applied to every service without an override.
    #[serde(flatten)]
    pub defaults: LoadBalancerProperties,

    /// Per-service overrides; an entry replaces the defaults for that service.
    pub clients: HashMap<String, LoadBalancerProperties>,
}

impl LoadBalancerConfig {
    /// Effective properties for `service_id`.
    pub fn properties(&self, service_id: &str) -> &LoadBalancerProperties {
        self.clients.get(service_id).unwrap_or(&self.defaults)
    }
}

/// Load balancer properties for one service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerProperties {
    /// Routing hints keyed by service id; "default" applies to unlisted services.
    pub hint: HashMap<String, String>,

    /// Request header that carries a per-request hint.
    pub hint_header_name: String,

    /// Surface raw status codes in lifecycle response data.
    pub use_raw_status_code_in_response_data: bool,

    /// Selection strategy ("round-robin" or "random").
    pub strategy: String,

    /// Retry behaviour for load-balanced calls.
    pub retry: RetryProperties,
}

impl Default for LoadBalancerProperties {
    fn default() -> Self {
        Self {
            hint: HashMap::new(),
            hint_header_name: "X-SC-LB-Hint".to_string(),
            use_raw_status_code_in_response_data: false,
            strategy: "round-robin".to_string(),
            retry: RetryProperties::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryProperties {
    /// Enable retries.
    pub enabled: bool,

    /// Retries against the instance that just failed.
    pub max_retries_on_same_service_instance: u32,

    /// Retries that move on to a freshly chosen instance.
    pub max_retries_on_next_service_instance: u32,

    /// Retry non-idempotent methods too.
    pub retry_on_all_operations: bool,

    /// Response status codes treated as retryable failures.
    pub retryable_status_codes: Vec<u16>,

    /// Backoff between attempts.
    pub backoff: BackoffProperties,
}

impl RetryProperties {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        1 + self.max_retries_on_same_service_instance + self.max_retries_on_next_service_instance
    }
}

impl Default for RetryProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries_on_same_service_instance: 0,
            max_retries_on_next_service_instance: 1,
            retry_on_all_operations: false,
            retryable_status_codes: Vec::new(),
            backoff: BackoffProperties::default(),
        }
    }
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffProperties {
    /// Sleep between attempts at all.
    pub enabled: bool,

    /// Base delay in milliseconds.
    pub min_backoff_ms: u64,

    /// Upper bound on a single delay in milliseconds.
    pub max_backoff_ms: u64,

    /// Jitter as a fraction of the computed delay (0.0 - 1.0).
    pub jitter: f64,
}

impl Default for BackoffProperties {
    fn default() -> Self {
        Self {
            enabled: false,
            min_backoff_ms: 5,
            max_backoff_ms: 1000,
            jitter: 0.5,
        }
    }
}

/// Timeout configuration for transport calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time to wait for a complete response in milliseconds.
    pub read_ms: u64,

    /// Follow 3xx redirects.
    pub follow_redirects: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 10_000,
            read_ms: 60_000,
            follow_redirects: true,
        }
    }
}

/// A statically configured service instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Instance identifier; defaults to "host:port".
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Reach the instance over https.
    #[serde(default)]
    pub secure: bool,

    /// Free-form metadata (e.g. "hint" or "zone").
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Record metrics from the built-in lifecycle observer.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}
