//! Interface proxies guarded by circuit breakers.
//!
//! # Data Flow
//! ```text
//! typed adapter method (e.g. OrdersClient::get_order)
//!     → InvocationDispatcher::invoke(signature, args, ctx)
//!     → dispatch.rs (signature → MethodHandler)
//!     → name resolver + breaker factory (breaker per operation)
//!     → breaker.run(supplier) | breaker.run_with_fallback(supplier, fallback)
//!     → MethodHandler (usually JsonMethodHandler → Client stack)
//! ```
//!
//! # Design Decisions
//! - Operations are keyed by a static [`MethodSignature`], not reflection
//! - Fallbacks are an explicit binding with one typed function per operation
//! - The caller's context is an explicit value moved into the deferred call

pub mod builder;
pub mod context;
pub mod dispatch;
pub mod dispatcher;
pub mod fallback;
pub mod method;

pub use builder::{client_name, CircuitBreakerBuilder};
pub use context::{CallContext, X_REQUEST_ID};
pub use dispatch::{Args, DispatchTable, JsonMethodHandler, MethodHandler, RequestTemplate};
pub use dispatcher::InvocationDispatcher;
pub use fallback::{FallbackBinding, FallbackMethod, FallbackMethods, NoFallback};
pub use method::{config_key, MethodSignature, Target};
