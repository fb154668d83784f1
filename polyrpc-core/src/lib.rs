//! Core types for multi-version JSON-RPC
//!
//! This crate holds everything about JSON-RPC that does not depend on how
//! procedures are registered or invoked:
//!
//! - **Types**: protocol versions, decoded requests and version-shaped response envelopes
//! - **Error handling**: the shared error taxonomy and its wire form
//! - **Signatures**: declared parameter and return types
//! - **Codec**: per-version parameter decoding (including the 1.1 numeric-key
//!   quirk), description mode and JSON payload helpers
//! - **Observability**: OpenTelemetry and structured logging setup
//!
//! The `polyrpc-server` crate builds the registry and dispatcher on top of it.
//!
//! # Example
//!
//! ```rust
//! use polyrpc_core::{codec, Request, Response, Version};
//! use serde_json::json;
//!
//! let payload = br#"{"version": "1.1", "method": "add", "params": {"0": 1, "1": 2}, "id": 9}"#;
//! let request = Request::from_value(&codec::decode_payload(payload).unwrap()).unwrap();
//! assert_eq!(request.version, Version::V1_1);
//!
//! let args = codec::decode_params(request.version, &request.params).unwrap();
//! assert_eq!(args.positional, vec![json!(1), json!(2)]);
//!
//! let response = Response::success(request.version, json!(9), json!(3));
//! assert_eq!(
//!     codec::encode(&response).unwrap(),
//!     r#"{"version":"1.1","id":9,"result":3}"#
//! );
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod signature;
pub mod types;

pub use codec::{Arguments, ParamDescription};
pub use error::{Error, ErrorKind, JsonRpcErrorData, Result};
pub use observability::{
    init_logging, init_observability, shutdown_observability, ObservabilityConfig,
};
pub use signature::{Signature, TypeTag};
pub use types::{Outcome, Request, Response, Version};
