//! Circuit breaker naming.
//!
//! A resolver is a pure function of (client name, target, method). Equal
//! inputs always yield the same name, so breaker state is shared by every call
//! of the same operation.

use crate::proxy::method::{config_key, MethodSignature, Target};

/// Derives the breaker identity for one operation.
pub trait CircuitBreakerNameResolver: Send + Sync {
    fn resolve(&self, client_name: &str, target: &Target, method: &MethodSignature) -> String;
}

impl<F> CircuitBreakerNameResolver for F
where
    F: Fn(&str, &Target, &MethodSignature) -> String + Send + Sync,
{
    fn resolve(&self, client_name: &str, target: &Target, method: &MethodSignature) -> String {
        self(client_name, target, method)
    }
}

/// `Type#method(Params)`, one breaker per operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigKeyNameResolver;

impl CircuitBreakerNameResolver for ConfigKeyNameResolver {
    fn resolve(&self, _client_name: &str, target: &Target, method: &MethodSignature) -> String {
        config_key(target.type_name(), method)
    }
}

/// The config key with every non-alphanumeric character removed.
///
/// Suitable for breaker backends that reject punctuation in names.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlphanumericNameResolver;

impl CircuitBreakerNameResolver for AlphanumericNameResolver {
    fn resolve(&self, _client_name: &str, target: &Target, method: &MethodSignature) -> String {
        config_key(target.type_name(), method)
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect()
    }
}

/// Resolver named by `circuit_breaker.name_resolver`; unknown names fall back
/// to the config-key policy.
pub fn resolver_from_config(name: &str) -> Box<dyn CircuitBreakerNameResolver> {
    match name {
        "alphanumeric" => Box::new(AlphanumericNameResolver),
        _ => Box::new(ConfigKeyNameResolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: MethodSignature = MethodSignature::new("OrdersApi", "search", &["String", "u32"]);

    #[test]
    fn test_config_key_uses_target_type() {
        let target = Target::for_service("OrdersClient", "orders");
        assert_eq!(
            ConfigKeyNameResolver.resolve("orders", &target, &SEARCH),
            "OrdersClient#search(String,u32)"
        );
    }

    #[test]
    fn test_alphanumeric() {
        let target = Target::for_service("OrdersClient", "orders");
        assert_eq!(
            AlphanumericNameResolver.resolve("orders", &target, &SEARCH),
            "OrdersClientsearchStringu32"
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let target = Target::for_service("OrdersClient", "orders");
        for resolver in [resolver_from_config("config-key"), resolver_from_config("alphanumeric")] {
            let first = resolver.resolve("orders", &target, &SEARCH);
            for _ in 0..10 {
                assert_eq!(resolver.resolve("orders", &target, &SEARCH), first);
            }
        }
    }

    #[test]
    fn test_closure_resolver() {
        let per_client = |client: &str, _: &Target, _: &MethodSignature| client.to_string();
        let target = Target::for_service("OrdersClient", "orders");
        assert_eq!(per_client.resolve("orders-v2", &target, &SEARCH), "orders-v2");
    }
}
