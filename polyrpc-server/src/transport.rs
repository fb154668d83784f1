//! Transport contract
//!
//! A framework-free rendering of the HTTP binding. The host web server turns
//! its request into a [`TransportRequest`], calls [`JsonRpcSite::handle`] and
//! writes the [`TransportResponse`] back:
//!
//! - **POST**: the body is decoded as JSON and dispatched. Undecodable bodies
//!   get a Parse error.
//! - **GET**: the read-only shortcut. The procedure named by the request must
//!   be flagged `safe`; the query string becomes 1.1 params (single values as
//!   strings, repeated keys as arrays) and the call is dispatched as
//!   `{"version": "1.1", "id": "jsonrpc", ...}`.
//! - anything else is rejected with status 405.
//!
//! Notifications produce an empty body and status 204.
//!
//! ```rust
//! use polyrpc_server::{from_fn, JsonRpcSite, Procedure, TransportRequest};
//! use serde_json::json;
//!
//! # async fn example() -> polyrpc_core::Result<()> {
//! let site = JsonRpcSite::builder()
//!     .procedure(Procedure::new("ping", from_fn(|_, _| async { Ok(json!("pong")) })).safe(true))
//!     .build()?;
//!
//! let response = site.handle(TransportRequest::get("ping", "")).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.content_type, "application/json-rpc");
//! # Ok(())
//! # }
//! ```

use crate::procedure::CallContext;
use crate::registry::Registry;
use crate::JsonRpcSite;
use polyrpc_core::{codec, Error, Response, Result, Version};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Content type of every JSON-RPC response body
pub const CONTENT_TYPE: &str = "application/json-rpc";

/// Id given to calls made through the GET shortcut
pub const GET_REQUEST_ID: &str = "jsonrpc";

/// An incoming transport request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportRequest {
    /// Transport verb, compared case-insensitively
    pub verb: String,
    /// Procedure named by the URL, used by the GET shortcut
    pub method: Option<String>,
    /// Decoded query string pairs, in order
    pub query: Vec<(String, String)>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Values forwarded to procedures through their call context
    pub metadata: HashMap<String, Value>,
}

impl TransportRequest {
    /// Request with the given verb and nothing else
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Default::default()
        }
    }

    /// POST request carrying a JSON body
    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::new("POST")
        }
    }

    /// GET request for `method` with a raw query string
    pub fn get(method: impl Into<String>, query: &str) -> Self {
        Self {
            method: Some(method.into()),
            query: parse_query(query),
            ..Self::new("GET")
        }
    }

    /// Attach a value for the call context
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    fn context(&self) -> CallContext {
        CallContext {
            verb: Some(self.verb.clone()),
            metadata: self.metadata.clone(),
            ..CallContext::default()
        }
    }
}

/// What the host should send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Serialized reply; empty for notifications
    pub body: String,
    pub content_type: &'static str,
}

impl TransportResponse {
    fn new(status: u16, body: String) -> Self {
        Self {
            status,
            body,
            content_type: CONTENT_TYPE,
        }
    }

    /// Whether the host should send an empty body
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Decode a raw query string into ordered pairs
///
/// A leading `?` is ignored; `+` and percent escapes are decoded.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Collapse query pairs into a params object
///
/// A key seen once maps to its string value; a repeated key maps to the
/// array of its values in order.
pub fn collapse_query(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some((_, values)) => values.push(value.as_str()),
            None => grouped.push((key.as_str(), vec![value.as_str()])),
        }
    }

    grouped
        .into_iter()
        .map(|(key, values)| {
            let value = match values.as_slice() {
                [single] => Value::from(*single),
                many => Value::from(many.to_vec()),
            };
            (key.to_string(), value)
        })
        .collect()
}

/// Build the request object for a GET shortcut call
///
/// # Errors
///
/// Returns Invalid Request if the procedure is unknown or not flagged `safe`.
pub fn get_request(registry: &Registry, method: &str, query: &[(String, String)]) -> Result<Value> {
    match registry.get(method) {
        Some(procedure) if procedure.is_safe() => Ok(json!({
            "params": collapse_query(query),
            "method": method,
            "id": GET_REQUEST_ID,
            "version": Version::V1_1.as_str(),
        })),
        _ => Err(Error::InvalidRequest(
            "The method you are trying to access is not available by GET requests".to_string(),
        )),
    }
}

impl JsonRpcSite {
    /// Handle one transport request end to end
    #[tracing::instrument(skip(self, request), fields(verb = %request.verb))]
    pub async fn handle(&self, request: TransportRequest) -> TransportResponse {
        let ctx = request.context();

        let payload = match self.read_payload(&request) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected transport request");
                let data = err.to_error_data(self.config().debug);
                let response = Response::error(Version::V1_0, Value::Null, data);
                return self.render(Some(&response), err.status());
            }
        };

        let (reply, status) = self.dispatch(ctx, payload).await;
        self.render(reply.as_ref(), status)
    }

    fn read_payload(&self, request: &TransportRequest) -> Result<Value> {
        if request.verb.eq_ignore_ascii_case("POST") {
            codec::decode_payload(&request.body)
        } else if request.verb.eq_ignore_ascii_case("GET") {
            let method = request.method.as_deref().unwrap_or_default();
            get_request(self.registry(), method, &request.query)
        } else {
            Err(Error::RequestMethod(format!(
                "JSON-RPC requests must be POST, got {}",
                request.verb
            )))
        }
    }

    fn render<T: serde::Serialize>(&self, reply: Option<&T>, status: u16) -> TransportResponse {
        let Some(reply) = reply else {
            return TransportResponse::new(status, String::new());
        };

        match codec::encode(reply) {
            Ok(body) => TransportResponse::new(status, body),
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode reply");
                let data = err.to_error_data(self.config().debug);
                let fallback = Response::error(Version::V1_0, Value::Null, data);
                let body = codec::encode(&fallback).unwrap_or_default();
                TransportResponse::new(err.status(), body)
            }
        }
    }
}
