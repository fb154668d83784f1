//! Multi-version JSON-RPC dispatcher
//!
//! This crate turns decoded JSON-RPC 1.0, 1.1 and 2.0 requests into response
//! envelopes. It owns everything between the transport and the application's
//! procedures, and is independent of any web framework.
//!
//! # Core Features
//!
//! - **Method Registry**: named procedures with declared signatures
//! - **Version Detection**: `jsonrpc` / `version` markers, 1.0 by default
//! - **Parameter Codec**: positional, keyword and the 1.1 numeric-key split
//! - **Validation**: arity and type checks against the declared signature
//! - **Batches and Notifications**: per-element isolation, silent notifications
//! - **GET Shortcut**: read-only calls for procedures flagged `safe`
//! - **Self-Description**: a built-in `system.describe` procedure
//! - **Middleware**: invocation interceptors for cross-cutting concerns
//! - **Observability**: OpenTelemetry metrics and `tracing` spans
//!
//! # Quick Start
//!
//! ```rust
//! use polyrpc_core::TypeTag;
//! use polyrpc_server::{from_typed_fn, JsonRpcSite, Procedure};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! # async fn example() -> polyrpc_core::Result<()> {
//! let site = JsonRpcSite::builder()
//!     .name("calculator")
//!     .procedure(
//!         Procedure::new("add", from_typed_fn(|p: AddParams| async move { Ok(p.a + p.b) }))
//!             .param("a", TypeTag::Number)
//!             .param("b", TypeTag::Number)
//!             .returns(TypeTag::Number)
//!             .validate(true),
//!     )
//!     .build()?;
//!
//! let request = json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 1});
//! let (reply, status) = site.dispatch(Default::default(), request).await;
//! assert_eq!(status, 200);
//! assert_eq!(
//!     serde_json::to_value(reply.unwrap()).unwrap(),
//!     json!({"jsonrpc": "2.0", "result": 3, "id": 1})
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Response Shapes
//!
//! | version | success                                  | error                                   |
//! |---------|------------------------------------------|-----------------------------------------|
//! | 1.0     | `{"result": r, "error": null, "id": i}`  | `{"result": null, "error": e, "id": i}` |
//! | 1.1     | `{"version": "1.1", "result": r, "id": i}` | `{"version": "1.1", "error": e, "id": i}` |
//! | 2.0     | `{"jsonrpc": "2.0", "result": r, "id": i}` | `{"jsonrpc": "2.0", "error": e, "id": i}` |

mod batch;
mod builder;
mod describe;
mod dispatcher;
mod encoder;
mod metrics;
mod middleware;
mod procedure;
mod registry;
mod transport;
mod validator;

pub use batch::{BatchMode, BatchProcessor};
pub use builder::{SiteBuilder, SiteConfig, DEBUG_ENV};
pub use describe::{
    describe_service, trim_docstring, DescribeHandler, ProcedureDescription, ReturnDescription,
    ServiceDescription, ServiceInfo, SD_VERSION,
};
pub use dispatcher::{Dispatcher, STATUS_NO_CONTENT, STATUS_OK};
pub use encoder::{package_result, DefaultEncoder, ResultEncoder};
pub use metrics::DispatchMetrics;
pub use middleware::{
    LoggingMiddleware, Middleware, MiddlewareAction, MiddlewareChain, MiddlewareContext,
    SyncMiddleware, TracingMiddleware,
};
pub use procedure::{
    from_fn, from_typed_fn, CallContext, Handler, HandlerResult, Opaque, Output, Procedure,
};
pub use registry::{Registry, WeakRegistry};
pub use transport::{
    collapse_query, get_request, parse_query, TransportRequest, TransportResponse, CONTENT_TYPE,
    GET_REQUEST_ID,
};
pub use validator::validate_params;

use polyrpc_core::{Response, Version};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// What a site sends back for one payload
///
/// A single request gets a single envelope; a batch gets one slot per
/// element, in order, with `null` for slots that produced no envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Single(Response),
    Batch(Vec<Option<Response>>),
}

impl Reply {
    pub fn is_batch(&self) -> bool {
        matches!(self, Reply::Batch(_))
    }

    /// The envelope of a single reply
    pub fn single(&self) -> Option<&Response> {
        match self {
            Reply::Single(response) => Some(response),
            Reply::Batch(_) => None,
        }
    }

    /// The slots of a batch reply
    pub fn batch(&self) -> Option<&[Option<Response>]> {
        match self {
            Reply::Single(_) => None,
            Reply::Batch(responses) => Some(responses),
        }
    }
}

/// A configured JSON-RPC site
///
/// Cloning is cheap; clones share the registry and the dispatcher.
#[derive(Clone)]
pub struct JsonRpcSite {
    config: Arc<SiteConfig>,
    registry: Registry,
    dispatcher: Dispatcher,
    batch: BatchProcessor,
    info: Arc<ServiceInfo>,
}

impl JsonRpcSite {
    /// Create a new site builder
    pub fn builder() -> SiteBuilder {
        SiteBuilder::new()
    }

    /// Dispatch a decoded payload
    ///
    /// Arrays are batches; anything else is a single request. Returns the
    /// reply, or `None` when no body must be sent, and the transport status.
    /// A batch over the size limit is answered with one Invalid Request
    /// envelope instead of an array.
    pub async fn dispatch(&self, ctx: CallContext, payload: Value) -> (Option<Reply>, u16) {
        match payload {
            Value::Array(batch) => {
                match self.batch.process_batch(&ctx, batch, &self.dispatcher).await {
                    Ok(responses) => (Some(Reply::Batch(responses)), STATUS_OK),
                    Err(err) => {
                        let data = err.to_error_data(self.config.debug);
                        let response = Response::error(Version::V1_0, Value::Null, data);
                        (Some(Reply::Single(response)), err.status())
                    }
                }
            }
            single => {
                let (response, status) = self.dispatcher.dispatch(ctx, &single, false).await;
                (response.map(Reply::Single), status)
            }
        }
    }

    /// Register a procedure after the site was built
    pub fn register(&self, procedure: Procedure) -> Option<Arc<Procedure>> {
        self.registry.register(procedure)
    }

    /// Describe the site and its procedures
    pub fn describe(&self) -> ServiceDescription {
        describe_service(&self.info, &self.registry)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Identity shown in the self-description
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }
}
