//! Invocation middleware
//!
//! Middleware wraps procedure invocation: it runs after the request has been
//! looked up and validated, and around the handler call. Each middleware can
//!
//! - inspect or rewrite the raw `params` before they are decoded
//! - short-circuit the call with its own result
//! - observe the outcome afterwards, including failures of notifications,
//!   which never reach the caller
//!
//! `pre_handle` runs in registration order, `post_handle` in reverse order.
//!
//! ```rust
//! use polyrpc_server::{JsonRpcSite, LoggingMiddleware};
//!
//! let site = JsonRpcSite::builder()
//!     .use_sync_middleware(LoggingMiddleware)
//!     .build();
//! assert!(site.is_ok());
//! ```

use async_trait::async_trait;
use polyrpc_core::{Result, Version};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Action to take after middleware pre-processing
#[derive(Debug, Clone)]
pub enum MiddlewareAction {
    /// Continue to next middleware/handler
    Continue,
    /// Skip the handler and use this value as the result
    ShortCircuit(Value),
}

/// Request information handed to middleware
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    /// Method being invoked
    pub method: String,
    /// Raw params, decoded after the chain has run
    pub params: Value,
    /// Declared protocol version
    pub version: Version,
    /// Request id; `None` for notifications
    pub request_id: Option<Value>,
    /// Metadata for passing data between middleware
    pub metadata: HashMap<String, Value>,
}

impl MiddlewareContext {
    /// Create a new middleware context
    pub fn new(method: impl Into<String>, params: Value, version: Version) -> Self {
        Self {
            method: method.into(),
            params,
            version,
            request_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach the request id
    pub fn with_request_id(mut self, request_id: Option<Value>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Whether the call is a notification
    pub fn is_notification(&self) -> bool {
        self.request_id.is_none()
    }

    /// Insert metadata that can be accessed by subsequent middleware
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Get metadata by key
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Trait for async middleware
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before handler execution
    async fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction>;

    /// Called after handler execution
    async fn post_handle(&self, ctx: &mut MiddlewareContext, result: &Result<Value>) -> Result<()>;
}

/// Trait for synchronous middleware
pub trait SyncMiddleware: Send + Sync {
    /// Called before handler execution
    fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction>;

    /// Called after handler execution
    fn post_handle(&self, ctx: &mut MiddlewareContext, result: &Result<Value>) -> Result<()>;
}

struct SyncMiddlewareAdapter<T: SyncMiddleware> {
    inner: T,
}

#[async_trait]
impl<T: SyncMiddleware + 'static> Middleware for SyncMiddlewareAdapter<T> {
    async fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
        self.inner.pre_handle(ctx)
    }

    async fn post_handle(&self, ctx: &mut MiddlewareContext, result: &Result<Value>) -> Result<()> {
        self.inner.post_handle(ctx, result)
    }
}

/// Chain of middleware to execute in order
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Add a sync middleware to the chain
    pub fn add_sync<T: SyncMiddleware + 'static>(&mut self, middleware: T) {
        self.middlewares
            .push(Arc::new(SyncMiddlewareAdapter { inner: middleware }));
    }

    /// Run the chain around `handler`
    ///
    /// A failing `pre_handle` aborts the call with its error. Every
    /// middleware whose `pre_handle` ran sees the outcome in `post_handle`,
    /// including a short-circuited one; `post_handle` errors are logged and
    /// otherwise ignored.
    pub async fn execute<F, Fut>(&self, mut ctx: MiddlewareContext, handler: F) -> Result<Value>
    where
        F: FnOnce(MiddlewareContext) -> Fut + Send,
        Fut: std::future::Future<Output = Result<Value>> + Send,
    {
        let mut entered = 0;
        let mut short_circuit = None;

        for middleware in &self.middlewares {
            match middleware.pre_handle(&mut ctx).await {
                Ok(MiddlewareAction::Continue) => entered += 1,
                Ok(MiddlewareAction::ShortCircuit(value)) => {
                    entered += 1;
                    short_circuit = Some(value);
                    break;
                }
                Err(e) => {
                    let result = Err(e);
                    self.unwind(&mut ctx, entered, &result).await;
                    return result;
                }
            }
        }

        let result = match short_circuit {
            Some(value) => Ok(value),
            None => handler(ctx.clone()).await,
        };

        self.unwind(&mut ctx, entered, &result).await;
        result
    }

    async fn unwind(&self, ctx: &mut MiddlewareContext, entered: usize, result: &Result<Value>) {
        for middleware in self.middlewares[..entered].iter().rev() {
            if let Err(e) = middleware.post_handle(ctx, result).await {
                tracing::warn!(method = %ctx.method, error = %e, "Middleware post_handle failed");
            }
        }
    }

    /// Get the number of middleware in the chain
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Built-in logging middleware
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl SyncMiddleware for LoggingMiddleware {
    fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
        tracing::info!(
            method = %ctx.method,
            version = %ctx.version,
            notification = ctx.is_notification(),
            "Request"
        );
        Ok(MiddlewareAction::Continue)
    }

    fn post_handle(&self, ctx: &mut MiddlewareContext, result: &Result<Value>) -> Result<()> {
        match result {
            Ok(value) => tracing::info!(
                method = %ctx.method,
                success = true,
                result = %value.to_string().chars().take(100).collect::<String>(),
                "Response"
            ),
            Err(e) => tracing::info!(
                method = %ctx.method,
                success = false,
                error = %e,
                "Response"
            ),
        }
        Ok(())
    }
}

/// Middleware that records a span per invocation
///
/// Fields: method, version and request id. The outcome is logged inside the
/// span once the handler has finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    pub fn new() -> Self {
        Self
    }

    fn span(ctx: &MiddlewareContext) -> tracing::Span {
        tracing::info_span!(
            "rpc_invocation",
            method = %ctx.method,
            version = %ctx.version,
            request_id = ?ctx.request_id,
        )
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction> {
        Self::span(ctx).in_scope(|| tracing::debug!("Invocation started"));
        Ok(MiddlewareAction::Continue)
    }

    async fn post_handle(&self, ctx: &mut MiddlewareContext, result: &Result<Value>) -> Result<()> {
        Self::span(ctx).in_scope(|| match result {
            Ok(_) => tracing::info!("Invocation completed successfully"),
            Err(e) => tracing::error!(error = %e, "Invocation failed"),
        });
        Ok(())
    }
}
