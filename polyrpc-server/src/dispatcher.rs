//! Single-request dispatch
//!
//! [`Dispatcher::dispatch`] takes one decoded request value through a fixed
//! sequence of stages, stopping at the first failure:
//!
//! 1. the value must be an object
//! 2. version detection (`jsonrpc`, then `version`, else 1.0)
//! 3. request shape: `method` must be a string, `params` defaults to `[]`
//! 4. registry lookup
//! 5. parameter validation, for procedures that ask for it
//! 6. a notification inside a batch is an Invalid Request
//! 7. parameter decoding and invocation, wrapped by the middleware chain
//! 8. result packaging through the result encoder
//!
//! Each stage returns a `Result`; the first error becomes the error envelope.
//! Envelopes use the version resolved so far, so failures before stage 2
//! completes are shaped as 1.0. The request id is echoed whenever the request
//! object carries one.
//!
//! A standalone notification produces no envelope and status 204, whether it
//! succeeds or fails. Its failures are only visible in the logs, the metrics
//! and the middleware chain.
//!
//! Panics inside procedures are caught and reported as Internal errors.

use crate::encoder::{package_result, DefaultEncoder, ResultEncoder};
use crate::metrics::DispatchMetrics;
use crate::middleware::{MiddlewareChain, MiddlewareContext};
use crate::procedure::{CallContext, Procedure};
use crate::registry::Registry;
use crate::validator::validate_params;
use futures::FutureExt;
use polyrpc_core::types::request_id;
use polyrpc_core::{codec, Error, Request, Response, Result, Version};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Status of a successful call
pub const STATUS_OK: u16 = 200;

/// Status of a call that produces no body
pub const STATUS_NO_CONTENT: u16 = 204;

/// What the dispatcher learned about a request before it failed or finished
struct DispatchState {
    version: Version,
    id: Option<Value>,
    method: Option<String>,
    /// Set once the request is known to be a standalone notification
    silent: bool,
}

/// Runs single requests against a registry
///
/// Cloning is cheap; clones share the registry, encoder, middleware and
/// metrics.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    encoder: Arc<dyn ResultEncoder>,
    middleware: MiddlewareChain,
    metrics: Option<Arc<DispatchMetrics>>,
    debug: bool,
}

impl Dispatcher {
    /// Dispatcher with the default encoder, no middleware, no metrics and
    /// diagnostic mode off
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            encoder: Arc::new(DefaultEncoder),
            middleware: MiddlewareChain::new(),
            metrics: None,
            debug: false,
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ResultEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Expose internal failure details in error envelopes
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn metrics(&self) -> Option<&Arc<DispatchMetrics>> {
        self.metrics.as_ref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Dispatch one request value
    ///
    /// Returns the envelope, or `None` when no body must be sent, together
    /// with the status the transport should use.
    #[tracing::instrument(skip(self, ctx, raw))]
    pub async fn dispatch(
        &self,
        ctx: CallContext,
        raw: &Value,
        in_batch: bool,
    ) -> (Option<Response>, u16) {
        let started = Instant::now();
        let mut state = DispatchState {
            version: Version::V1_0,
            id: raw.as_object().and_then(request_id),
            method: None,
            silent: false,
        };

        let outcome = AssertUnwindSafe(self.run(ctx, raw, in_batch, &mut state))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));

        let elapsed = started.elapsed().as_secs_f64();
        let method = state.method.as_deref().unwrap_or("");

        match outcome {
            Ok(Some(result)) => {
                tracing::debug!(method, version = %state.version, "Request succeeded");
                self.record(method, state.version, "success", elapsed);
                let id = state.id.unwrap_or(Value::Null);
                (Some(Response::success(state.version, id, result)), STATUS_OK)
            }
            Ok(None) => {
                tracing::debug!(method, "Notification handled");
                self.record(method, state.version, "notification", elapsed);
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(method);
                }
                (None, STATUS_NO_CONTENT)
            }
            Err(err) => {
                let data = err.to_error_data(self.debug);
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(err.kind(), data.code);
                }
                self.record(method, state.version, "error", elapsed);

                if state.silent {
                    tracing::error!(method, error = %err, "Notification failed");
                    return (None, STATUS_NO_CONTENT);
                }

                if err.is_taxonomy() {
                    tracing::warn!(method, code = data.code, error = %err, "Request failed");
                } else {
                    tracing::error!(method, error = %err, "Request raised an internal error");
                }

                let id = state.id.unwrap_or(Value::Null);
                (Some(Response::error(state.version, id, data)), err.status())
            }
        }
    }

    async fn run(
        &self,
        mut ctx: CallContext,
        raw: &Value,
        in_batch: bool,
        state: &mut DispatchState,
    ) -> Result<Option<Value>> {
        let object = raw
            .as_object()
            .ok_or_else(|| Error::InvalidRequest("Request must be a JSON object".to_string()))?;

        state.version = Version::detect(object)?;
        let request = Request::from_object(object, state.version)?;
        state.method = Some(request.method.clone());
        state.silent = request.is_notification() && !in_batch;

        tracing::debug!(
            method = %request.method,
            version = %request.version,
            notification = request.is_notification(),
            "Dispatching request"
        );

        let procedure = self.registry.lookup(&request.method)?;

        if procedure.validates() {
            validate_params(&procedure, &request.params)?;
        }

        if in_batch && request.is_notification() {
            return Err(Error::InvalidRequest(
                "Notifications are not valid batch elements".to_string(),
            ));
        }

        ctx.method = request.method.clone();
        ctx.version = request.version;
        ctx.id = request.id.clone();
        ctx.in_batch = in_batch;
        ctx.signature = procedure.declared().clone();

        let result = self.invoke(&procedure, ctx, &request).await?;
        Ok((!request.is_notification()).then_some(result))
    }

    /// Decode params, call the handler and package its output, inside the
    /// middleware chain
    async fn invoke(
        &self,
        procedure: &Procedure,
        ctx: CallContext,
        request: &Request,
    ) -> Result<Value> {
        let handler = procedure.handler();
        let encoder = Arc::clone(&self.encoder);
        let version = request.version;
        let notification = request.is_notification();

        let call = move |mctx: MiddlewareContext| async move {
            let args = codec::decode_params(version, &mctx.params)?;

            let output = AssertUnwindSafe(async move { handler.call(ctx, args).await })
                .catch_unwind()
                .await
                .map_err(|payload| panic_error(payload.as_ref()))??;

            // Notification results are discarded unencoded
            if notification {
                return Ok(Value::Null);
            }
            package_result(output, encoder.as_ref())
        };

        let mctx = MiddlewareContext::new(request.method.clone(), request.params.clone(), version)
            .with_request_id(request.id.clone());

        if self.middleware.is_empty() {
            call(mctx).await
        } else {
            self.middleware.execute(mctx, call).await
        }
    }

    fn record(&self, method: &str, version: Version, outcome: &str, elapsed: f64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method, version, outcome, elapsed);
        }
    }
}

/// Internal error describing a caught panic
pub(crate) fn panic_error(payload: &(dyn Any + Send)) -> Error {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "procedure panicked".to_string());
    Error::Internal(detail)
}
