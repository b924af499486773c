//! Service instance abstraction.
//!
//! An instance is one addressable endpoint behind a logical service id. It is
//! resolved fresh for every call and never cached by the executor.

use std::collections::HashMap;

use url::Url;

use crate::config::InstanceConfig;

/// A concrete endpoint chosen by the load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub service_id: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Create an instance with no metadata.
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            service_id: service_id.into(),
            instance_id: format!("{}:{}", host, port),
            host,
            port,
            secure: false,
            metadata: HashMap::new(),
        }
    }

    /// Build an instance of `service_id` from its configuration entry.
    pub fn from_config(service_id: &str, config: &InstanceConfig) -> Self {
        Self {
            service_id: service_id.to_string(),
            instance_id: config
                .instance_id
                .clone()
                .unwrap_or_else(|| format!("{}:{}", config.host, config.port)),
            host: config.host.clone(),
            port: config.port,
            secure: config.secure,
            metadata: config.metadata.clone(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Base URI of this instance, e.g. `http://10.0.0.1:8080/`.
    pub fn uri(&self) -> Option<Url> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Url::parse(&format!("{}://{}:{}", self.scheme(), host, self.port)).ok()
    }
}
