//! Resilient remote-service client.
//!
//! Calls through a local interface proxy are guarded by circuit breakers with
//! optional fallbacks; the HTTP calls underneath are load balanced across
//! service instances, observed through lifecycle hooks and optionally retried.
//!
//! # Architecture Overview
//!
//! ```text
//!   typed adapter ──▶ proxy::InvocationDispatcher ──▶ resilience::CircuitBreaker
//!                                                          │ supplier / fallback
//!                                                          ▼
//!                                               proxy::MethodHandler
//!                                                          │ OutboundRequest
//!                                                          ▼
//!                                    resilience::RetryableClient (optional)
//!                                                          │
//!                                                          ▼
//!                        load_balancer::LoadBalancedClient ──▶ lifecycle observers
//!                                                          │ rewritten URL
//!                                                          ▼
//!                                               http::HttpTransport
//! ```

// Core subsystems
pub mod error;
pub mod http;
pub mod load_balancer;
pub mod proxy;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::ClientConfig;
pub use error::{FeignError, FeignResult};
pub use http::{Client, HttpTransport, OutboundRequest, RequestOptions, Response};
pub use load_balancer::{LoadBalancedClient, StaticLoadBalancer};
pub use proxy::{CallContext, CircuitBreakerBuilder, InvocationDispatcher, MethodSignature, Target};
pub use resilience::{build_client, DefaultCircuitBreakerFactory, RetryableClient};
