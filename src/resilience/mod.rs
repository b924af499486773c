//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy method call:
//!     → name_resolver.rs (breaker identity for client/target/method)
//!     → circuit_breaker.rs (get-or-create breaker, run or fail fast)
//!
//! Load-balanced HTTP call:
//!     → retries.rs (re-run selection + execution while the policy allows)
//!     → backoff.rs (delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Breaker state is shared per resolved name, never per call
//! - Retries only for safe methods unless configured otherwise
//! - Precondition failures are never retried

pub mod backoff;
pub mod circuit_breaker;
pub mod name_resolver;
pub mod retries;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerFactory, CircuitState, DefaultCircuitBreaker, DefaultCircuitBreakerFactory,
    FallbackFn, Supplier,
};
pub use name_resolver::{
    resolver_from_config, AlphanumericNameResolver, CircuitBreakerNameResolver, ConfigKeyNameResolver,
};
pub use retries::{
    build_client, LoadBalancedRetryPolicy, PropertiesRetryPolicyFactory, RetryDecision, RetryPolicy,
    RetryPolicyFactory, RetryableClient,
};
