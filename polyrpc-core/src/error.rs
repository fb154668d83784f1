//! Error taxonomy for polyrpc
//!
//! This module provides the closed set of error kinds shared by every protocol
//! version. It defines two main error types:
//!
//! - **Error**: Application-level errors raised by dispatch stages and procedures
//! - **JsonRpcErrorData**: The wire form placed in a response envelope's `error` slot
//!
//! # Taxonomy
//!
//! | kind            | code     | default message    | status |
//! |-----------------|----------|--------------------|--------|
//! | Parse           | `-32700` | Parse error.       | 400    |
//! | InvalidRequest  | `-32600` | Invalid Request.   | 400    |
//! | MethodNotFound  | `-32601` | Method not found.  | 404    |
//! | InvalidParams   | `-32602` | Invalid params.    | 400    |
//! | Internal        | `-32603` | Internal error.    | 500    |
//! | Server          | `-32000` | Server error.      | 500    |
//!
//! The status is never sent on the wire; it is handed to the transport so it
//! can pick its own response code.
//!
//! # Masking
//!
//! Errors outside the taxonomy (internal failures, unsupported return values,
//! serialization problems) are reported as Internal errors. Unless diagnostic
//! mode is enabled their detail is replaced by `Internal Server Error`.
//!
//! # Examples
//!
//! ```rust
//! use polyrpc_core::{Error, ErrorKind};
//!
//! let error = Error::InvalidParams("Not enough params provided for add(a=Number) -> Any".into());
//! assert_eq!(error.kind(), ErrorKind::InvalidParams);
//! assert_eq!(error.code(), -32602);
//!
//! let wire = error.to_error_data(false);
//! assert_eq!(wire.name, "JSONRPCError");
//! assert_eq!(wire.error, wire.message);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for polyrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Name carried by every wire-level error object
pub const ERROR_NAME: &str = "JSONRPCError";

/// Message substituted for internal failures outside diagnostic mode
pub const MASKED_MESSAGE: &str = "Internal Server Error";

/// Taxonomy kind of an error
///
/// Every `Error` maps onto exactly one kind. The kind fixes the numeric code,
/// the default human text and the status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed payload that could not be decoded at all
    Parse,
    /// Well-formed JSON that is not an acceptable request
    InvalidRequest,
    /// Method name absent from the registry
    MethodNotFound,
    /// Arity or type mismatch against the declared signature
    InvalidParams,
    /// Unexpected failure inside the dispatcher or a procedure
    Internal,
    /// Application-defined failure raised by a procedure
    Server,
}

impl ErrorKind {
    /// Numeric JSON-RPC error code
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Parse => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::Internal => -32603,
            ErrorKind::Server => -32000,
        }
    }

    /// Default human-readable text used when no detail is available
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Parse => "Parse error.",
            ErrorKind::InvalidRequest => "Invalid Request.",
            ErrorKind::MethodNotFound => "Method not found.",
            ErrorKind::InvalidParams => "Invalid params.",
            ErrorKind::Internal => "Internal error.",
            ErrorKind::Server => "Server error.",
        }
    }

    /// HTTP-equivalent status handed to the transport
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::Parse | ErrorKind::InvalidRequest | ErrorKind::InvalidParams => 400,
            ErrorKind::MethodNotFound => 404,
            ErrorKind::Internal | ErrorKind::Server => 500,
        }
    }

    /// Map a wire code back onto a kind
    ///
    /// Codes in the implementation-defined server range (`-32099..=-32000`)
    /// and unknown codes both resolve to `Server`.
    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => ErrorKind::Parse,
            -32600 => ErrorKind::InvalidRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            -32603 => ErrorKind::Internal,
            _ => ErrorKind::Server,
        }
    }

    /// Short snake_case label, used for metrics and log fields
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::MethodNotFound => "method_not_found",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::Internal => "internal_error",
            ErrorKind::Server => "server_error",
        }
    }
}

/// Application-level error type for polyrpc operations
///
/// Each dispatch stage returns `Result<T>` with this error and the dispatcher
/// turns the first failure into an error envelope. Procedures return it too:
/// taxonomy variants pass through to the caller unchanged, everything else is
/// reported as an Internal error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Error already in wire format, typically raised by a procedure that
    /// wants full control over code, message and data
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The payload could not be decoded as JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The payload is JSON but not an acceptable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The transport verb cannot carry a JSON-RPC call
    ///
    /// An Invalid Request flavour that asks the transport for status 405.
    #[error("Invalid request method: {0}")]
    RequestMethod(String),

    /// The method is not registered; the message lists what is available
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Parameters do not match the declared signature
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Application-defined failure raised deliberately by a procedure
    #[error("Server error: {0}")]
    Server(String),

    /// Unexpected failure; masked outside diagnostic mode
    #[error("Internal error: {0}")]
    Internal(String),

    /// A procedure returned a value the result encoder cannot represent
    #[error("Return type not supported, for {0}")]
    UnsupportedType(String),

    /// Conversion between Rust values and JSON failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::JsonRpc(data) => ErrorKind::from_code(data.code),
            Error::Parse(_) => ErrorKind::Parse,
            Error::InvalidRequest(_) | Error::RequestMethod(_) => ErrorKind::InvalidRequest,
            Error::MethodNotFound(_) => ErrorKind::MethodNotFound,
            Error::InvalidParams(_) => ErrorKind::InvalidParams,
            Error::Server(_) => ErrorKind::Server,
            Error::Internal(_) | Error::UnsupportedType(_) | Error::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Numeric code placed on the wire
    pub fn code(&self) -> i32 {
        match self {
            Error::JsonRpc(data) => data.code,
            other => other.kind().code(),
        }
    }

    /// Status handed to the transport
    pub fn status(&self) -> u16 {
        match self {
            Error::RequestMethod(_) => 405,
            other => other.kind().status(),
        }
    }

    /// Whether this error belongs to the taxonomy proper
    ///
    /// Taxonomy errors are shown to the caller verbatim. The rest are
    /// unexpected failures whose detail is only shown in diagnostic mode.
    pub fn is_taxonomy(&self) -> bool {
        !matches!(
            self,
            Error::Internal(_) | Error::UnsupportedType(_) | Error::Serialization(_)
        )
    }

    /// Build the wire form of this error
    ///
    /// `debug` enables diagnostic mode: internal failures keep their full
    /// description instead of the generic masked message.
    pub fn to_error_data(&self, debug: bool) -> JsonRpcErrorData {
        let kind = self.kind();
        match self {
            Error::JsonRpc(data) => data.clone(),
            _ if !self.is_taxonomy() => {
                if debug {
                    JsonRpcErrorData::new(kind.code(), self.to_string())
                } else {
                    JsonRpcErrorData::new(kind.code(), MASKED_MESSAGE)
                }
            }
            Error::Parse(msg)
            | Error::InvalidRequest(msg)
            | Error::RequestMethod(msg)
            | Error::MethodNotFound(msg)
            | Error::InvalidParams(msg)
            | Error::Server(msg) => {
                let message = if msg.is_empty() {
                    kind.default_message().to_string()
                } else {
                    msg.clone()
                };
                JsonRpcErrorData::new(self.code(), message)
            }
            // is_taxonomy() covers the remaining variants above
            _ => JsonRpcErrorData::new(kind.code(), kind.default_message()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Wire-format error object
///
/// This is the exact shape placed in a response envelope's `error` slot for
/// every protocol version:
///
/// ```json
/// {"name": "JSONRPCError", "code": -32601, "message": "...", "error": "..."}
/// ```
///
/// `error` mirrors `message`. `data` is only present when a procedure
/// attached extra information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Constant error object name
    #[serde(default = "default_error_name")]
    pub name: String,

    /// Numeric error code
    pub code: i32,

    /// Human-readable error text
    pub message: String,

    /// Mirror of `message`
    #[serde(default)]
    pub error: String,

    /// Optional additional error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

fn default_error_name() -> String {
    ERROR_NAME.to_string()
}

impl JsonRpcErrorData {
    /// Create a new wire error with code and message
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polyrpc_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::new(-32000, "Database connection failed");
    /// assert_eq!(error.error, "Database connection failed");
    /// ```
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            name: default_error_name(),
            code,
            error: message.clone(),
            message,
            data: None,
        }
    }

    /// Create a new wire error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(code, message)
        }
    }

    /// Create the default error object for a taxonomy kind
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind.code(), kind.default_message())
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::from_kind(ErrorKind::Parse)
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest.code(), msg)
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotFound.code(), msg)
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams.code(), msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal.code(), msg)
    }

    /// Create a batch size exceeded error (-32600)
    pub fn batch_size_exceeded(limit: usize, actual: usize) -> Self {
        Self::invalid_request(format!(
            "Batch size limit exceeded: limit={}, actual={}",
            limit, actual
        ))
    }

    /// Taxonomy kind of this error object
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found."
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_taxonomy_codes() {
        let kinds = vec![
            (ErrorKind::Parse, -32700, 400),
            (ErrorKind::InvalidRequest, -32600, 400),
            (ErrorKind::MethodNotFound, -32601, 404),
            (ErrorKind::InvalidParams, -32602, 400),
            (ErrorKind::Internal, -32603, 500),
            (ErrorKind::Server, -32000, 500),
        ];

        for (kind, code, status) in kinds {
            assert_eq!(kind.code(), code);
            assert_eq!(kind.status(), status);
            assert_eq!(ErrorKind::from_code(code), kind);
            assert!(!kind.default_message().is_empty());
        }
    }

    #[test]
    fn test_request_method_status() {
        let error = Error::RequestMethod("JSON-RPC requests must be POST".into());
        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        assert_eq!(error.code(), -32600);
        assert_eq!(error.status(), 405);
    }

    #[test]
    fn test_taxonomy_error_keeps_detail() {
        let error = Error::MethodNotFound("Method not found. Available methods: echo".into());
        let wire = error.to_error_data(false);

        assert_eq!(wire.code, -32601);
        assert_eq!(wire.message, "Method not found. Available methods: echo");
        assert_eq!(wire.error, wire.message);
        assert_eq!(wire.name, ERROR_NAME);
    }

    #[test]
    fn test_empty_detail_uses_default_message() {
        let wire = Error::InvalidRequest(String::new()).to_error_data(false);
        assert_eq!(wire.message, "Invalid Request.");
    }

    #[test]
    fn test_internal_error_masked() {
        let error = Error::Internal("database password is hunter2".into());
        let wire = error.to_error_data(false);

        assert_eq!(wire.code, -32603);
        assert_eq!(wire.message, MASKED_MESSAGE);
        assert!(!wire.message.contains("hunter2"));
    }

    #[test]
    fn test_internal_error_diagnostic_mode() {
        let error = Error::UnsupportedType("Opaque".into());
        let wire = error.to_error_data(true);

        assert_eq!(wire.code, -32603);
        assert!(wire.message.contains("Return type not supported"));
        assert!(wire.message.contains("Opaque"));
    }

    #[test]
    fn test_jsonrpc_variant_passes_through() {
        let data = JsonRpcErrorData::with_data(1001, "Insufficient funds", json!({"balance": 50}));
        let error = Error::from(data.clone());

        assert_eq!(error.code(), 1001);
        assert_eq!(error.kind(), ErrorKind::Server);
        assert_eq!(error.to_error_data(false), data);
    }

    #[test]
    fn test_wire_round_trip() {
        let wire = Error::InvalidParams("Too many params provided for add() -> Any".into())
            .to_error_data(false);

        let serialized = serde_json::to_string(&wire).unwrap();
        let decoded: JsonRpcErrorData = serde_json::from_str(&serialized).unwrap();

        assert_eq!(decoded.code, wire.code);
        assert_eq!(decoded.message, wire.message);
        assert_eq!(decoded, wire);
    }

    #[test]
    fn test_wire_shape() {
        let wire = JsonRpcErrorData::method_not_found("Method not found.");
        let value = serde_json::to_value(&wire).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "JSONRPCError",
                "code": -32601,
                "message": "Method not found.",
                "error": "Method not found.",
            })
        );
    }

    #[test]
    fn test_deserialize_minimal_error() {
        let error: JsonRpcErrorData =
            serde_json::from_str(r#"{"code":-32601,"message":"Method not found"}"#).unwrap();

        assert_eq!(error.name, ERROR_NAME);
        assert_eq!(error.code, -32601);
        assert!(error.data.is_none());
    }

    #[test]
    fn test_batch_size_exceeded_creation() {
        let error = JsonRpcErrorData::batch_size_exceeded(100, 150);

        assert_eq!(error.code, -32600);
        assert!(error.message.contains("100"));
        assert!(error.message.contains("150"));
    }

    #[test]
    fn test_display_formatting() {
        let error = JsonRpcErrorData::parse_error();
        assert_eq!(error.to_string(), "[-32700] Parse error.");
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let error = Error::from(serde_error);

        assert!(matches!(error, Error::Serialization(_)));
        assert!(!error.is_taxonomy());
    }
}
