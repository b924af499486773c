//! Error definitions shared by the proxy, resilience and load balancer layers.

use thiserror::Error;

/// Errors raised while invoking a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeignError {
    /// The request URL has no host that could name a service.
    #[error("Request URI does not contain a valid hostname: {0}")]
    InvalidServiceId(String),

    /// The transport failed to reach the instance or read its reply.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting for a response.
    #[error("Request to {url} timed out after {after_ms} ms")]
    Timeout { url: String, after_ms: u64 },

    /// The circuit breaker rejected the call without running it.
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    /// A breaker failure with no fallback path to absorb it.
    #[error("No fallback available: {0}")]
    NoFallbackAvailable(#[source] Box<FeignError>),

    /// Wrapper raised by the invocation plumbing around a fallback or handler.
    ///
    /// `cause` is `None` when the plumbing failed without an underlying error.
    #[error("Invocation failed")]
    Invocation { cause: Option<Box<FeignError>> },

    /// Argument or response (de)serialization failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The dispatch table has no handler for the invoked method.
    #[error("No method handler registered for {0}")]
    UnknownMethod(String),

    /// A fallback binding does not cover every dispatched method.
    #[error("Fallback does not implement {0}")]
    MissingFallbackMethod(String),

    /// The remote side answered with a non-success status.
    #[error("{method} {url} returned status {status}: {body}")]
    Status {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    /// The outbound request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for remote invocations.
pub type FeignResult<T> = Result<T, FeignError>;

impl FeignError {
    /// Precondition violations surface immediately and are never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FeignError::InvalidServiceId(_)
                | FeignError::UnknownMethod(_)
                | FeignError::MissingFallbackMethod(_)
                | FeignError::InvalidRequest(_)
        )
    }

    /// Strips exactly one wrapper layer from a failure raised on the fallback path.
    ///
    /// Only `NoFallbackAvailable` and `Invocation` are wrappers. An `Invocation`
    /// without a cause is already the generic form and is returned as is.
    pub fn unwrap_fallback_failure(self) -> FeignError {
        match self {
            FeignError::NoFallbackAvailable(inner) => *inner,
            FeignError::Invocation { cause: Some(inner) } => *inner,
            other => other,
        }
    }

    /// Wraps `cause` in the invocation wrapper.
    pub fn invocation(cause: FeignError) -> Self {
        FeignError::Invocation {
            cause: Some(Box::new(cause)),
        }
    }

    /// The generic invocation failure used when no underlying cause exists.
    pub fn generic_invocation() -> Self {
        FeignError::Invocation { cause: None }
    }
}

impl From<serde_json::Error> for FeignError {
    fn from(e: serde_json::Error) -> Self {
        FeignError::Codec(e.to_string())
    }
}
