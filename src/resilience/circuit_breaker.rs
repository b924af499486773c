//! Circuit breaker guarding remote invocations.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: the operation is assumed down, calls fail fast
//! - Half-Open: a limited number of probe calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: open_duration elapsed (checked on the next call)
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! Only probe calls move a half-open circuit; a call admitted while closed
//! that settles late leaves the state alone.
//!
//! # Design Decisions
//! - One breaker per resolved name, optionally scoped to a group
//! - Breakers are created through a factory with get-or-create semantics
//! - The state lock is never held across an await point

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::config::{BreakerSettings, CircuitBreakerConfig};
use crate::error::{FeignError, FeignResult};
use crate::observability::metrics;

/// Deferred call run by a breaker.
pub type Supplier = BoxFuture<'static, FeignResult<Value>>;

/// Alternate path invoked with the failure that diverted the call.
pub type FallbackFn = Box<dyn FnOnce(FeignError) -> BoxFuture<'static, FeignResult<Value>> + Send>;

/// A stateful guard around one operation.
pub trait CircuitBreaker: Send + Sync {
    fn name(&self) -> &str;

    /// Run `supplier`, or fail fast with `NoFallbackAvailable` when open.
    fn run(&self, supplier: Supplier) -> BoxFuture<'_, FeignResult<Value>>;

    /// Run `supplier`; any failure, including rejection, goes to `fallback`.
    fn run_with_fallback(&self, supplier: Supplier, fallback: FallbackFn) -> BoxFuture<'_, FeignResult<Value>>;
}

/// Creates or retrieves breakers by name.
///
/// Implementations must return the same breaker for the same identity, even
/// when called concurrently.
pub trait CircuitBreakerFactory: Send + Sync {
    fn create(&self, name: &str) -> Arc<dyn CircuitBreaker>;

    fn create_in_group(&self, name: &str, group: &str) -> Arc<dyn CircuitBreaker>;
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct DefaultCircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl DefaultCircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probes_in_flight: 0,
            }),
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state, without applying the open → half-open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> Result<Permit<'_>, FeignError> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            let cooled = inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.settings.open_duration());
            if !cooled {
                return Err(FeignError::CircuitOpen(self.name.clone()));
            }
            tracing::info!(breaker = %self.name, "Circuit half-open, probing");
            inner.state = CircuitState::HalfOpen;
            inner.probes_in_flight = 0;
        }

        match inner.state {
            CircuitState::HalfOpen if inner.probes_in_flight >= self.settings.half_open_max_calls.max(1) => {
                Err(FeignError::CircuitOpen(self.name.clone()))
            }
            CircuitState::HalfOpen => {
                inner.probes_in_flight += 1;
                Ok(Permit::new(self, true))
            }
            _ => Ok(Permit::new(self, false)),
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();
        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen if probe => {
                tracing::info!(breaker = %self.name, "Circuit closed");
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
            }
            // Calls admitted before the circuit opened do not decide recovery.
            _ => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.lock();
        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen if probe => {
                tracing::warn!(breaker = %self.name, "Probe failed, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
    }

    async fn call(&self, permit: Permit<'_>, supplier: Supplier) -> FeignResult<Value> {
        let result = supplier.await;
        permit.settle(result.is_ok());
        metrics::record_breaker_call(&self.name, if result.is_ok() { "success" } else { "failure" });
        result
    }

    fn rejected(&self, reason: &FeignError) {
        tracing::debug!(breaker = %self.name, reason = %reason, "Call rejected");
        metrics::record_breaker_call(&self.name, "rejected");
    }
}

impl CircuitBreaker for DefaultCircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, supplier: Supplier) -> BoxFuture<'_, FeignResult<Value>> {
        Box::pin(async move {
            match self.acquire() {
                Ok(permit) => self.call(permit, supplier).await,
                Err(rejected) => {
                    self.rejected(&rejected);
                    Err(FeignError::NoFallbackAvailable(Box::new(rejected)))
                }
            }
        })
    }

    fn run_with_fallback(&self, supplier: Supplier, fallback: FallbackFn) -> BoxFuture<'_, FeignResult<Value>> {
        Box::pin(async move {
            let failure = match self.acquire() {
                Ok(permit) => match self.call(permit, supplier).await {
                    Ok(value) => return Ok(value),
                    Err(e) => e,
                },
                Err(rejected) => {
                    self.rejected(&rejected);
                    rejected
                }
            };
            fallback(failure).await
        })
    }
}

/// Admission to run one call. A dropped, unsettled probe frees its slot.
struct Permit<'a> {
    breaker: &'a DefaultCircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a DefaultCircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    fn settle(mut self, success: bool) {
        self.settled = true;
        if success {
            self.breaker.on_success(self.probe);
        } else {
            self.breaker.on_failure(self.probe);
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

/// Factory backed by a concurrent map keyed by (group, name).
#[derive(Debug, Default)]
pub struct DefaultCircuitBreakerFactory {
    config: CircuitBreakerConfig,
    breakers: DashMap<(Option<String>, String), Arc<DefaultCircuitBreaker>>,
}

impl DefaultCircuitBreakerFactory {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// An already created breaker, if any.
    pub fn get(&self, name: &str, group: Option<&str>) -> Option<Arc<DefaultCircuitBreaker>> {
        self.breakers
            .get(&(group.map(str::to_string), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    fn get_or_create(&self, name: &str, group: Option<&str>) -> Arc<DefaultCircuitBreaker> {
        let settings = group
            .and_then(|g| self.config.groups.get(g))
            .unwrap_or(&self.config.defaults);

        self.breakers
            .entry((group.map(str::to_string), name.to_string()))
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, group = ?group, "Creating circuit breaker");
                Arc::new(DefaultCircuitBreaker::new(name, settings.clone()))
            })
            .value()
            .clone()
    }
}

impl CircuitBreakerFactory for DefaultCircuitBreakerFactory {
    fn create(&self, name: &str) -> Arc<dyn CircuitBreaker> {
        self.get_or_create(name, None)
    }

    fn create_in_group(&self, name: &str, group: &str) -> Arc<dyn CircuitBreaker> {
        self.get_or_create(name, Some(group))
    }
}
