//! Invocation dispatcher.
//!
//! # Responsibilities
//! - Look up the handler for the invoked operation
//! - Wrap the call in a deferred supplier carrying the caller's context
//! - Resolve the breaker identity and get or create the breaker
//! - Run through the breaker, diverting to the fallback when one is bound
//!
//! Identity (`PartialEq`, `Hash`, `Display`) is answered locally from the
//! target and never touches a breaker.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::Instrument;

use crate::error::{FeignError, FeignResult};
use crate::proxy::context::CallContext;
use crate::proxy::dispatch::{Args, DispatchTable};
use crate::proxy::fallback::{FallbackBinding, FallbackMethods, NoFallback};
use crate::proxy::method::{MethodSignature, Target};
use crate::resilience::{CircuitBreakerFactory, CircuitBreakerNameResolver, FallbackFn, Supplier};

/// Proxy core for one remote interface.
pub struct InvocationDispatcher<F: ?Sized = NoFallback> {
    factory: Arc<dyn CircuitBreakerFactory>,
    client_name: String,
    target: Target,
    dispatch: Arc<DispatchTable>,
    fallback: FallbackBinding<F>,
    fallback_methods: Arc<FallbackMethods<F>>,
    group_enabled: bool,
    name_resolver: Arc<dyn CircuitBreakerNameResolver>,
}

impl<F: ?Sized> InvocationDispatcher<F> {
    /// Callers validate fallback coverage beforehand.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        factory: Arc<dyn CircuitBreakerFactory>,
        client_name: String,
        target: Target,
        dispatch: DispatchTable,
        fallback: FallbackBinding<F>,
        fallback_methods: FallbackMethods<F>,
        group_enabled: bool,
        name_resolver: Arc<dyn CircuitBreakerNameResolver>,
    ) -> Self {
        Self {
            factory,
            client_name,
            target,
            dispatch: Arc::new(dispatch),
            fallback,
            fallback_methods: Arc::new(fallback_methods),
            group_enabled,
            name_resolver,
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> InvocationDispatcher<F> {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn has_fallback(&self) -> bool {
        !self.fallback.is_none()
    }

    /// Invoke `method` with a fresh call context.
    pub async fn invoke(&self, method: &MethodSignature, args: Args) -> FeignResult<Value> {
        self.invoke_with_context(method, args, CallContext::new()).await
    }

    /// Invoke `method`, handing `ctx` to the deferred call.
    pub async fn invoke_with_context(
        &self,
        method: &MethodSignature,
        args: Args,
        ctx: CallContext,
    ) -> FeignResult<Value> {
        let handler = self
            .dispatch
            .get(method)
            .cloned()
            .ok_or_else(|| FeignError::UnknownMethod(method.config_key()))?;

        let name = self.name_resolver.resolve(&self.client_name, &self.target, method);
        let breaker = if self.group_enabled {
            self.factory.create_in_group(&name, &self.client_name)
        } else {
            self.factory.create(&name)
        };

        let span = tracing::debug_span!(
            "invoke",
            request_id = %ctx.request_id(),
            method = %method,
            breaker = %name
        );

        if self.fallback.is_none() {
            let supplier: Supplier = Box::pin(async move { handler.invoke(args, ctx).await }.instrument(span));
            return breaker.run(supplier).await;
        }

        let fallback = self.fallback_for(method, args.clone())?;
        let supplier: Supplier = Box::pin(async move { handler.invoke(args, ctx).await }.instrument(span));
        breaker.run_with_fallback(supplier, fallback).await
    }

    /// The breaker fallback path: build the fallback value for the failure
    /// and call its counterpart of `method` with the original arguments.
    fn fallback_for(&self, method: &MethodSignature, args: Args) -> FeignResult<FallbackFn> {
        let fallback_method = self
            .fallback_methods
            .get(method)
            .cloned()
            .ok_or_else(|| FeignError::MissingFallbackMethod(method.config_key()))?;
        let binding = self.fallback.clone();
        let method = method.config_key();

        Ok(Box::new(move |cause: FeignError| -> BoxFuture<'static, FeignResult<Value>> {
            Box::pin(async move {
                let Some(instance) = binding.create(&cause) else {
                    return Err(cause);
                };
                tracing::debug!(method = %method, cause = %cause, "Invoking fallback");
                fallback_method(instance, args)
                    .await
                    .map_err(FeignError::unwrap_fallback_failure)
            })
        }))
    }
}

impl<F: ?Sized> PartialEq for InvocationDispatcher<F> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<F: ?Sized> Eq for InvocationDispatcher<F> {}

impl<F: ?Sized> Hash for InvocationDispatcher<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

impl<F: ?Sized> fmt::Display for InvocationDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target, f)
    }
}

impl<F: ?Sized> fmt::Debug for InvocationDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationDispatcher")
            .field("client_name", &self.client_name)
            .field("target", &self.target)
            .field("dispatch", &self.dispatch)
            .field("fallback", &self.fallback)
            .field("group_enabled", &self.group_enabled)
            .finish_non_exhaustive()
    }
}
