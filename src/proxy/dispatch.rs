//! Dispatch table: method signature → request invoker.
//!
//! The table is built once per proxy and only read afterwards, so it is
//! shared behind an `Arc` without locking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::Method;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{FeignError, FeignResult};
use crate::http::{Client, OutboundRequest, RequestOptions};
use crate::proxy::context::{CallContext, X_REQUEST_ID};
use crate::proxy::method::{MethodSignature, Target};

/// Positional call arguments.
pub type Args = Vec<Value>;

/// Performs the remote call for one operation.
pub trait MethodHandler: Send + Sync {
    fn invoke<'a>(&'a self, args: Args, ctx: CallContext) -> BoxFuture<'a, FeignResult<Value>>;
}

impl<F, Fut> MethodHandler for F
where
    F: Fn(Args, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = FeignResult<Value>> + Send + 'static,
{
    fn invoke<'a>(&'a self, args: Args, ctx: CallContext) -> BoxFuture<'a, FeignResult<Value>> {
        Box::pin(self(args, ctx))
    }
}

/// Immutable mapping from operation to handler.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: HashMap<MethodSignature, Arc<dyn MethodHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing any previous one.
    pub fn with(mut self, method: MethodSignature, handler: impl MethodHandler + 'static) -> Self {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    pub fn get(&self, method: &MethodSignature) -> Option<&Arc<dyn MethodHandler>> {
        self.handlers.get(method)
    }

    pub fn contains(&self, method: &MethodSignature) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodSignature> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys().map(|m| m.config_key())).finish()
    }
}

/// Where arguments go in an HTTP request.
///
/// Path placeholders are `{0}`, `{1}`, ... referring to argument positions.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    path: String,
    query: Vec<(String, usize)>,
    body: Option<usize>,
}

impl RequestTemplate {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Send argument `index` as query parameter `name`.
    pub fn query(mut self, name: impl Into<String>, index: usize) -> Self {
        self.query.push((name.into(), index));
        self
    }

    /// Send argument `index` as the JSON body.
    pub fn body(mut self, index: usize) -> Self {
        self.body = Some(index);
        self
    }

    /// Expand the template against `target` and `args`.
    pub fn expand(&self, target: &Target, args: &[Value], ctx: &CallContext) -> FeignResult<OutboundRequest> {
        let arg = |index: usize| {
            args.get(index).ok_or_else(|| {
                FeignError::InvalidRequest(format!("{} expects argument {}", self.path, index))
            })
        };

        let mut path = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            path.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let index = after
                .find('}')
                .and_then(|close| after[..close].parse::<usize>().ok().map(|index| (index, close)));
            match index {
                Some((index, close)) => {
                    let encoded: String = form_urlencoded::byte_serialize(render(arg(index)?).as_bytes()).collect();
                    path.push_str(&encoded.replace('+', "%20"));
                    rest = &after[close + 1..];
                }
                None => {
                    path.push('{');
                    rest = after;
                }
            }
        }
        path.push_str(rest);

        let mut url = format!("{}{}", target.url().trim_end_matches('/'), path);
        if !self.query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (name, index) in &self.query {
                let value = arg(*index)?;
                if !value.is_null() {
                    serializer.append_pair(name, &render(value));
                }
            }
            let query = serializer.finish();
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }

        let mut builder = OutboundRequest::builder(self.method.clone(), &url)
            .header(X_REQUEST_ID, &ctx.request_id().to_string())?;
        if let Some(index) = self.body {
            builder = builder
                .header("content-type", "application/json")?
                .body(serde_json::to_vec(arg(index)?)?)
                .charset("UTF-8");
        }
        builder.build()
    }
}

/// Plain strings are rendered without JSON quotes.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Request invoker that speaks JSON over a [`Client`] stack.
pub struct JsonMethodHandler {
    target: Target,
    template: RequestTemplate,
    client: Arc<dyn Client>,
    options: RequestOptions,
}

impl JsonMethodHandler {
    pub fn new(target: Target, template: RequestTemplate, client: Arc<dyn Client>, options: RequestOptions) -> Self {
        Self {
            target,
            template,
            client,
            options,
        }
    }
}

impl MethodHandler for JsonMethodHandler {
    fn invoke<'a>(&'a self, args: Args, ctx: CallContext) -> BoxFuture<'a, FeignResult<Value>> {
        Box::pin(async move {
            let request = self.template.expand(&self.target, &args, &ctx)?;
            let method = request.method().to_string();
            let response = self.client.execute(request, &self.options).await?;

            if !response.is_success() {
                return Err(FeignError::Status {
                    status: response.status(),
                    method,
                    url: response.request().url().to_string(),
                    body: response.text(),
                });
            }
            if response.body().is_empty() {
                return Ok(Value::Null);
            }
            Ok(serde_json::from_slice(response.body())?)
        })
    }
}
