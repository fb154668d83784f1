//! polyrpc - multi-version JSON-RPC dispatching
//!
//! This is the convenience crate that re-exports the polyrpc sub-crates.
//! Use it if you want a single dependency for building a JSON-RPC site.
//!
//! # Architecture
//!
//! polyrpc is organized into two crates:
//!
//! - **polyrpc-core**: error taxonomy, protocol versions, envelopes,
//!   parameter codec, observability
//! - **polyrpc-server**: registry, validator, dispatcher, batches, GET
//!   shortcut, self-description, middleware
//!
//! # Quick Start
//!
//! ```rust
//! use polyrpc::{from_fn, JsonRpcSite, Procedure, TransportRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let site = JsonRpcSite::builder()
//!         .name("greeter")
//!         .procedure(
//!             Procedure::new("hello", from_fn(|_, args| async move {
//!                 let name = args.get(0).and_then(|v| v.as_str()).unwrap_or("world").to_string();
//!                 Ok(json!(format!("Hello, {}!", name)))
//!             }))
//!             .safe(true),
//!         )
//!         .build()?;
//!
//!     // Hand the site whatever the web framework received
//!     let response = site
//!         .handle(TransportRequest::post(r#"{"jsonrpc": "2.0", "method": "hello", "params": ["Ada"], "id": 1}"#))
//!         .await;
//!     assert_eq!(response.status, 200);
//!     assert_eq!(response.body, r#"{"jsonrpc":"2.0","id":1,"result":"Hello, Ada!"}"#);
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under short names
pub use polyrpc_core as core;
pub use polyrpc_server as server;

// Convenience re-exports of the most commonly used types
pub use polyrpc_core::{Error, Result, Signature, TypeTag, Version};
pub use polyrpc_server::{
    from_fn, from_typed_fn, JsonRpcSite, Procedure, Reply, TransportRequest, TransportResponse,
};
