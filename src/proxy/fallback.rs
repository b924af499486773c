//! Fallback bindings.
//!
//! A proxy has at most one binding: a fixed fallback value, or a factory that
//! builds one from the failure that triggered it. Each dispatched operation
//! maps to a typed fallback function taking the fallback value and the
//! original arguments.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::{FeignError, FeignResult};
use crate::proxy::dispatch::{Args, DispatchTable};
use crate::proxy::method::MethodSignature;

/// Builds a fallback value from the triggering failure.
pub type FallbackFactoryFn<F> = Arc<dyn Fn(&FeignError) -> Arc<F> + Send + Sync>;

/// Fallback implementation of one operation.
pub type FallbackMethod<F> = Arc<dyn Fn(Arc<F>, Args) -> BoxFuture<'static, FeignResult<Value>> + Send + Sync>;

/// Where fallback values come from.
pub enum FallbackBinding<F: ?Sized> {
    None,
    Instance(Arc<F>),
    Factory(FallbackFactoryFn<F>),
}

impl<F: ?Sized> FallbackBinding<F> {
    pub fn factory(factory: impl Fn(&FeignError) -> Arc<F> + Send + Sync + 'static) -> Self {
        FallbackBinding::Factory(Arc::new(factory))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FallbackBinding::None)
    }

    /// The fallback value for `cause`; a factory is called once per call.
    pub fn create(&self, cause: &FeignError) -> Option<Arc<F>> {
        match self {
            FallbackBinding::None => None,
            FallbackBinding::Instance(instance) => Some(instance.clone()),
            FallbackBinding::Factory(factory) => Some(factory(cause)),
        }
    }
}

impl<F: ?Sized> Clone for FallbackBinding<F> {
    fn clone(&self) -> Self {
        match self {
            FallbackBinding::None => FallbackBinding::None,
            FallbackBinding::Instance(instance) => FallbackBinding::Instance(instance.clone()),
            FallbackBinding::Factory(factory) => FallbackBinding::Factory(factory.clone()),
        }
    }
}

impl<F: ?Sized> std::fmt::Debug for FallbackBinding<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackBinding::None => f.write_str("None"),
            FallbackBinding::Instance(_) => f.write_str("Instance(..)"),
            FallbackBinding::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Fallback functions keyed by the operation they stand in for.
pub struct FallbackMethods<F: ?Sized> {
    methods: HashMap<MethodSignature, FallbackMethod<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> FallbackMethods<F> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    pub fn with<G, Fut>(mut self, method: MethodSignature, fallback: G) -> Self
    where
        G: Fn(Arc<F>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FeignResult<Value>> + Send + 'static,
    {
        let bound: FallbackMethod<F> =
            Arc::new(move |instance: Arc<F>, args: Args| -> BoxFuture<'static, FeignResult<Value>> {
                Box::pin(fallback(instance, args))
            });
        self.methods.insert(method, bound);
        self
    }
}

impl<F: ?Sized> FallbackMethods<F> {
    pub fn get(&self, method: &MethodSignature) -> Option<&FallbackMethod<F>> {
        self.methods.get(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Fail with the first dispatched operation lacking a fallback.
    pub fn ensure_covers(&self, dispatch: &DispatchTable) -> FeignResult<()> {
        let mut missing: Vec<String> = dispatch
            .methods()
            .filter(|m| !self.methods.contains_key(*m))
            .map(MethodSignature::config_key)
            .collect();
        missing.sort();
        match missing.into_iter().next() {
            Some(method) => Err(FeignError::MissingFallbackMethod(method)),
            None => Ok(()),
        }
    }
}

impl<F: ?Sized + Send + Sync + 'static> Default for FallbackMethods<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback type of a proxy built without a fallback.
#[derive(Debug)]
pub enum NoFallback {}
