//! Call-scoped context carried into deferred invocations.
//!
//! The breaker may run a call on another task, so the context active when the
//! proxy method was called is captured as a value and handed to the handler.

use std::collections::BTreeMap;

use uuid::Uuid;

/// Header used to forward the request id to remote services.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request id plus free-form attributes of the calling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    request_id: Uuid,
    attributes: BTreeMap<String, String>,
}

impl CallContext {
    /// A fresh context with a random request id.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4())
    }

    /// A context continuing an existing request.
    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
