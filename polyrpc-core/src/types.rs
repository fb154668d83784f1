//! Protocol versions, requests and response envelopes
//!
//! Three incompatible JSON-RPC dialects share one data model here:
//!
//! - **1.0**: no version marker; positional params only; responses always
//!   carry both `result` and `error`, one of them `null`
//! - **1.1**: `"version": "1.1"` marker; params may mix numeric-string keys
//!   (positional slots) with named keys; responses carry exactly one of
//!   `result` / `error`
//! - **2.0**: `"jsonrpc": "2.0"` marker; params are an array or an object;
//!   responses carry exactly one of `result` / `error`
//!
//! # Request IDs
//!
//! IDs are opaque JSON values and are echoed back untouched. A request whose
//! `id` is absent or `null` is a notification.

use crate::error::{Error, JsonRpcErrorData, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// JSON-RPC protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// No version marker present
    #[default]
    V1_0,
    /// Declared with `"version": "1.1"`
    V1_1,
    /// Declared with `"jsonrpc": "2.0"`
    V2_0,
}

impl Version {
    /// All versions the dispatcher understands
    pub const SUPPORTED: [Version; 3] = [Version::V1_0, Version::V1_1, Version::V2_0];

    /// Version string as it appears on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
            Version::V2_0 => "2.0",
        }
    }

    /// Parse a version string
    pub fn parse(s: &str) -> Option<Version> {
        Version::SUPPORTED.into_iter().find(|v| v.as_str() == s)
    }

    /// Determine the version a request object declares
    ///
    /// A `jsonrpc` field takes precedence over a `version` field. Whichever is
    /// present must be a string naming a supported version. With neither
    /// field the request is 1.0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polyrpc_core::Version;
    /// use serde_json::json;
    ///
    /// let req = json!({"jsonrpc": "2.0", "method": "ping"});
    /// assert_eq!(Version::detect(req.as_object().unwrap()).unwrap(), Version::V2_0);
    ///
    /// let req = json!({"method": "ping"});
    /// assert_eq!(Version::detect(req.as_object().unwrap()).unwrap(), Version::V1_0);
    /// ```
    pub fn detect(request: &Map<String, Value>) -> Result<Version> {
        let declared = request.get("jsonrpc").or_else(|| request.get("version"));
        match declared {
            None => Ok(Version::V1_0),
            Some(value) => value.as_str().and_then(Version::parse).ok_or_else(|| {
                Error::InvalidRequest(format!("JSON-RPC version {} not supported.", value))
            }),
        }
    }

    /// Whether responses must carry exactly one of `result` / `error`
    pub fn has_exclusive_outcome(self) -> bool {
        !matches!(self, Version::V1_0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded request
///
/// Built once per dispatch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Name of the procedure to invoke
    pub method: String,
    /// Raw parameters exactly as received; `[]` when omitted
    pub params: Value,
    /// Request id; `None` when absent or `null`
    pub id: Option<Value>,
    /// Declared protocol version
    pub version: Version,
}

impl Request {
    /// Build a request from a decoded object whose version is already known
    ///
    /// Missing `params` default to an empty array. `method` must be a string.
    pub fn from_object(object: &Map<String, Value>, version: Version) -> Result<Request> {
        let method = match object.get("method") {
            Some(Value::String(method)) => method.clone(),
            Some(other) => {
                return Err(Error::InvalidRequest(format!(
                    "Request method must be a string, got {}",
                    other
                )))
            }
            None => {
                return Err(Error::InvalidRequest(
                    "Request requires str:\"method\" and list:\"params\"".to_string(),
                ))
            }
        };

        Ok(Request {
            method,
            params: object
                .get("params")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            id: request_id(object),
            version,
        })
    }

    /// Build a request from any decoded JSON value
    pub fn from_value(value: &Value) -> Result<Request> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidRequest("Request must be a JSON object".to_string()))?;
        let version = Version::detect(object)?;
        Request::from_object(object, version)
    }

    /// Whether this request expects no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Extract a non-null `id` from a request object
pub fn request_id(object: &Map<String, Value>) -> Option<Value> {
    match object.get("id") {
        None | Some(Value::Null) => None,
        Some(id) => Some(id.clone()),
    }
}

/// Success or failure carried by a response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Value returned by the procedure
    Result(Value),
    /// Wire form of the failure
    Error(JsonRpcErrorData),
}

/// Version-tagged response envelope
///
/// The wire shape depends on the version:
///
/// | version | shape |
/// |---------|-------|
/// | 1.0 | `{"id", "result", "error"}`, one of the last two `null` |
/// | 1.1 | `{"version": "1.1", "id", "result" \| "error"}` |
/// | 2.0 | `{"jsonrpc": "2.0", "id", "result" \| "error"}` |
///
/// Holding the outcome as an enum makes "exactly one of result/error" hold by
/// construction; serialization only decides how the absent side is written.
///
/// # Examples
///
/// ```rust
/// use polyrpc_core::{Response, Version};
/// use serde_json::json;
///
/// let response = Response::success(Version::V2_0, json!(1), json!("pong"));
/// assert_eq!(
///     serde_json::to_value(&response).unwrap(),
///     json!({"jsonrpc": "2.0", "id": 1, "result": "pong"})
/// );
///
/// let response = Response::success(Version::V1_0, json!(1), json!("pong"));
/// assert_eq!(
///     serde_json::to_value(&response).unwrap(),
///     json!({"id": 1, "result": "pong", "error": null})
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Version that decides the wire shape
    pub version: Version,
    /// Echoed request id, or `null`
    pub id: Value,
    /// Result or error
    pub outcome: Outcome,
}

impl Response {
    /// Create a success envelope
    pub fn success(version: Version, id: Value, result: Value) -> Self {
        Self {
            version,
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Create an error envelope
    pub fn error(version: Version, id: Value, error: JsonRpcErrorData) -> Self {
        Self {
            version,
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Check if the envelope carries a result
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Check if the envelope carries an error
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// The result, if any
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// The error, if any
    pub fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.outcome {
            Outcome::Error(error) => Some(error),
            Outcome::Result(_) => None,
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Every shape has three entries: a version tag plus id and one outcome
        // slot, or id plus both outcome slots for 1.0.
        let mut map = serializer.serialize_map(Some(3))?;

        match self.version {
            Version::V2_0 => map.serialize_entry("jsonrpc", "2.0")?,
            Version::V1_1 => map.serialize_entry("version", "1.1")?,
            Version::V1_0 => {}
        }
        map.serialize_entry("id", &self.id)?;

        match (&self.outcome, self.version.has_exclusive_outcome()) {
            (Outcome::Result(result), true) => map.serialize_entry("result", result)?,
            (Outcome::Error(error), true) => map.serialize_entry("error", error)?,
            (Outcome::Result(result), false) => {
                map.serialize_entry("result", result)?;
                map.serialize_entry("error", &Value::Null)?;
            }
            (Outcome::Error(error), false) => {
                map.serialize_entry("result", &Value::Null)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// Loose wire shape accepted when reading envelopes back
#[derive(Deserialize)]
struct RawResponse {
    jsonrpc: Option<String>,
    version: Option<String>,
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorData>,
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawResponse::deserialize(deserializer)?;
        let version = match (raw.jsonrpc.as_deref(), raw.version.as_deref()) {
            (Some(v), _) | (None, Some(v)) => Version::parse(v).ok_or_else(|| {
                serde::de::Error::custom(format!("unsupported JSON-RPC version {}", v))
            })?,
            (None, None) => Version::V1_0,
        };
        let outcome = match raw.error {
            Some(error) => Outcome::Error(error),
            None => Outcome::Result(raw.result.unwrap_or(Value::Null)),
        };
        Ok(Response {
            version,
            id: raw.id,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_detect_versions() {
        assert_eq!(Version::detect(&object(json!({}))).unwrap(), Version::V1_0);
        assert_eq!(
            Version::detect(&object(json!({"version": "1.1"}))).unwrap(),
            Version::V1_1
        );
        assert_eq!(
            Version::detect(&object(json!({"jsonrpc": "2.0"}))).unwrap(),
            Version::V2_0
        );
    }

    #[test]
    fn test_jsonrpc_field_wins() {
        let req = object(json!({"jsonrpc": "2.0", "version": "1.1"}));
        assert_eq!(Version::detect(&req).unwrap(), Version::V2_0);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let err = Version::detect(&object(json!({"jsonrpc": "3.0"}))).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        // Numeric markers are not strings
        let err = Version::detect(&object(json!({"version": 1.1}))).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_request_defaults_params() {
        let req = Request::from_value(&json!({"method": "ping", "id": 1})).unwrap();

        assert_eq!(req.method, "ping");
        assert_eq!(req.params, json!([]));
        assert_eq!(req.id, Some(json!(1)));
        assert_eq!(req.version, Version::V1_0);
    }

    #[test]
    fn test_null_id_is_notification() {
        let req = Request::from_value(&json!({"method": "ping", "id": null})).unwrap();
        assert!(req.is_notification());

        let req = Request::from_value(&json!({"method": "ping"})).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_request_requires_string_method() {
        assert!(Request::from_value(&json!({"params": []})).is_err());
        assert!(Request::from_value(&json!({"method": 5})).is_err());
        assert!(Request::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_response_shape_v11() {
        let ok = Response::success(Version::V1_1, json!("a"), json!([1]));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"version": "1.1", "id": "a", "result": [1]})
        );

        let err = Response::error(
            Version::V1_1,
            json!("a"),
            JsonRpcErrorData::invalid_params("bad"),
        );
        let value = serde_json::to_value(&err).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32602);
    }

    #[test]
    fn test_response_shape_v10_error() {
        let err = Response::error(Version::V1_0, Value::Null, JsonRpcErrorData::parse_error());
        let value = serde_json::to_value(&err).unwrap();

        assert_eq!(value["result"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
        assert_eq!(value["id"], Value::Null);
    }

    #[test]
    fn test_response_deserialize() {
        let value = json!({"jsonrpc": "2.0", "id": 7, "error": {"code": -32601, "message": "nope"}});
        let response: Response = serde_json::from_value(value).unwrap();

        assert_eq!(response.version, Version::V2_0);
        assert_eq!(response.id, json!(7));
        assert_eq!(response.error_data().unwrap().code, -32601);

        let value = json!({"id": 1, "result": null, "error": null});
        let response: Response = serde_json::from_value(value).unwrap();
        assert_eq!(response.version, Version::V1_0);
        assert_eq!(response.result(), Some(&Value::Null));
    }
}
