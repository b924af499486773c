//! Builder producing [`InvocationDispatcher`]s.

use std::sync::Arc;

use crate::config::CircuitBreakerConfig;
use crate::error::{FeignError, FeignResult};
use crate::proxy::dispatch::DispatchTable;
use crate::proxy::dispatcher::InvocationDispatcher;
use crate::proxy::fallback::{FallbackBinding, FallbackMethods, NoFallback};
use crate::proxy::method::Target;
use crate::resilience::{resolver_from_config, CircuitBreakerFactory, CircuitBreakerNameResolver, ConfigKeyNameResolver};

/// Collects the breaker wiring shared by every proxy of one client.
#[derive(Clone)]
pub struct CircuitBreakerBuilder {
    factory: Arc<dyn CircuitBreakerFactory>,
    client_name: String,
    group_enabled: bool,
    name_resolver: Arc<dyn CircuitBreakerNameResolver>,
}

impl CircuitBreakerBuilder {
    pub fn new(factory: Arc<dyn CircuitBreakerFactory>) -> Self {
        Self {
            factory,
            client_name: String::new(),
            group_enabled: false,
            name_resolver: Arc::new(ConfigKeyNameResolver),
        }
    }

    /// Grouping flag and naming policy taken from `config`.
    pub fn from_config(factory: Arc<dyn CircuitBreakerFactory>, config: &CircuitBreakerConfig) -> Self {
        Self {
            group_enabled: config.group_enabled,
            name_resolver: Arc::from(resolver_from_config(&config.name_resolver)),
            ..Self::new(factory)
        }
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn group_enabled(mut self, enabled: bool) -> Self {
        self.group_enabled = enabled;
        self
    }

    pub fn name_resolver(mut self, resolver: impl CircuitBreakerNameResolver + 'static) -> Self {
        self.name_resolver = Arc::new(resolver);
        self
    }

    /// A dispatcher without fallback.
    pub fn target(self, target: Target, dispatch: DispatchTable) -> InvocationDispatcher<NoFallback> {
        self.assemble(target, dispatch, FallbackBinding::None, FallbackMethods::new())
    }

    /// A dispatcher that diverts failures to a fixed fallback value.
    pub fn target_with_fallback<F>(
        self,
        target: Target,
        dispatch: DispatchTable,
        fallback: Arc<F>,
        methods: FallbackMethods<F>,
    ) -> FeignResult<InvocationDispatcher<F>>
    where
        F: ?Sized + Send + Sync + 'static,
    {
        self.build(target, dispatch, FallbackBinding::Instance(fallback), methods)
    }

    /// A dispatcher that builds its fallback from each triggering failure.
    pub fn target_with_fallback_factory<F>(
        self,
        target: Target,
        dispatch: DispatchTable,
        factory: impl Fn(&FeignError) -> Arc<F> + Send + Sync + 'static,
        methods: FallbackMethods<F>,
    ) -> FeignResult<InvocationDispatcher<F>>
    where
        F: ?Sized + Send + Sync + 'static,
    {
        self.build(target, dispatch, FallbackBinding::factory(factory), methods)
    }

    /// A dispatcher for an explicit binding.
    ///
    /// Fails with `MissingFallbackMethod` when a binding is present and some
    /// dispatched operation has no fallback method.
    pub fn build<F>(
        self,
        target: Target,
        dispatch: DispatchTable,
        fallback: FallbackBinding<F>,
        methods: FallbackMethods<F>,
    ) -> FeignResult<InvocationDispatcher<F>>
    where
        F: ?Sized + Send + Sync + 'static,
    {
        if !fallback.is_none() {
            methods.ensure_covers(&dispatch)?;
        }
        Ok(self.assemble(target, dispatch, fallback, methods))
    }

    fn assemble<F: ?Sized>(
        self,
        target: Target,
        dispatch: DispatchTable,
        fallback: FallbackBinding<F>,
        methods: FallbackMethods<F>,
    ) -> InvocationDispatcher<F> {
        let client_name = self.effective_client_name(&target);
        InvocationDispatcher::new(
            self.factory,
            client_name,
            target,
            dispatch,
            fallback,
            methods,
            self.group_enabled,
            self.name_resolver,
        )
    }

    fn effective_client_name(&self, target: &Target) -> String {
        if self.client_name.is_empty() {
            target.name().to_string()
        } else {
            self.client_name.clone()
        }
    }
}

impl std::fmt::Debug for CircuitBreakerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerBuilder")
            .field("client_name", &self.client_name)
            .field("group_enabled", &self.group_enabled)
            .finish_non_exhaustive()
    }
}

/// Client name used for breaker grouping: the context id when set, else the
/// client's declared name.
pub fn client_name(name: &str, context_id: Option<&str>) -> String {
    match context_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => name.to_string(),
    }
}
