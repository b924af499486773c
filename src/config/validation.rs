//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, ports valid, jitter in range)
//! - Reject unknown strategy and resolver names
//!
//! Returns all validation errors, not just the first.

use thiserror::Error;

use crate::config::schema::{ClientConfig, LoadBalancerProperties};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

const STRATEGIES: &[&str] = &["round-robin", "random"];
const NAME_RESOLVERS: &[&str] = &["config-key", "alphanumeric"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cb = &config.circuit_breaker;
    if !NAME_RESOLVERS.contains(&cb.name_resolver.as_str()) {
        errors.push(ValidationError::new(
            "circuit_breaker.name_resolver",
            format!("unknown resolver '{}'", cb.name_resolver),
        ));
    }
    let groups = cb.groups.iter().map(|(name, s)| (format!("circuit_breaker.groups.{}", name), s));
    for (prefix, settings) in std::iter::once(("circuit_breaker".to_string(), &cb.defaults)).chain(groups) {
        if settings.failure_threshold == 0 {
            errors.push(ValidationError::new(format!("{}.failure_threshold", prefix), "must be > 0"));
        }
        if settings.open_duration_ms == 0 {
            errors.push(ValidationError::new(format!("{}.open_duration_ms", prefix), "must be > 0"));
        }
        if settings.half_open_max_calls == 0 {
            errors.push(ValidationError::new(format!("{}.half_open_max_calls", prefix), "must be > 0"));
        }
    }

    validate_properties("loadbalancer", &config.loadbalancer.defaults, &mut errors);
    for (service_id, props) in &config.loadbalancer.clients {
        validate_properties(&format!("loadbalancer.clients.{}", service_id), props, &mut errors);
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be > 0"));
    }
    if config.timeouts.read_ms == 0 {
        errors.push(ValidationError::new("timeouts.read_ms", "must be > 0"));
    }

    for (service_id, instances) in &config.services {
        for (i, instance) in instances.iter().enumerate() {
            if instance.host.trim().is_empty() {
                errors.push(ValidationError::new(format!("services.{}[{}].host", service_id, i), "must not be empty"));
            }
            if instance.port == 0 {
                errors.push(ValidationError::new(format!("services.{}[{}].port", service_id, i), "must be > 0"));
            }
        }
    }

    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", config.observability.log_format),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_properties(prefix: &str, props: &LoadBalancerProperties, errors: &mut Vec<ValidationError>) {
    if !STRATEGIES.contains(&props.strategy.as_str()) {
        errors.push(ValidationError::new(
            format!("{}.strategy", prefix),
            format!("unknown strategy '{}'", props.strategy),
        ));
    }
    if props.hint_header_name.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.hint_header_name", prefix), "must not be empty"));
    }

    let backoff = &props.retry.backoff;
    if !(0.0..=1.0).contains(&backoff.jitter) {
        errors.push(ValidationError::new(format!("{}.retry.backoff.jitter", prefix), "must be within 0.0..=1.0"));
    }
    if backoff.min_backoff_ms > backoff.max_backoff_ms {
        errors.push(ValidationError::new(
            format!("{}.retry.backoff", prefix),
            "min_backoff_ms must not exceed max_backoff_ms",
        ));
    }
    for code in &props.retry.retryable_status_codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::new(
                format!("{}.retry.retryable_status_codes", prefix),
                format!("{} is not an HTTP status code", code),
            ));
        }
    }
}
