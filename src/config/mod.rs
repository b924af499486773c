//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via Arc with the breaker factory and load balancer
//! ```
//!
//! Every field has a default so a minimal (even empty) file is a valid config.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackoffProperties, BreakerSettings, CircuitBreakerConfig, ClientConfig, InstanceConfig,
    LoadBalancerConfig, LoadBalancerProperties, ObservabilityConfig, RetryProperties, TimeoutConfig,
};
