//! Procedure descriptors and handler adapters
//!
//! A [`Procedure`] bundles a callable [`Handler`] with the static metadata
//! the dispatcher needs: the declared [`Signature`], the `safe` flag (callable
//! through the read-only GET shortcut), the `validate` flag (check arity and
//! types before invoking) and a free-text summary used by self-description.
//!
//! Handlers receive the per-call [`CallContext`] and the decoded
//! [`Arguments`], and return an [`Output`]. Most code never implements
//! [`Handler`] by hand:
//!
//! - [`from_fn`] wraps an async closure over the raw context and arguments
//! - [`from_typed_fn`] deserializes the arguments into a serde type and
//!   serializes whatever the closure returns
//!
//! # Examples
//!
//! ```rust
//! use polyrpc_server::{from_fn, from_typed_fn, Procedure};
//! use polyrpc_core::TypeTag;
//! use serde::Deserialize;
//!
//! let echo = Procedure::new("echo", from_fn(|_ctx, args| async move {
//!     args.into_value()
//! }))
//! .summary("Return the params unchanged")
//! .safe(true);
//!
//! #[derive(Deserialize)]
//! struct Add { a: i64, b: i64 }
//!
//! let add = Procedure::new("add", from_typed_fn(|p: Add| async move { Ok(p.a + p.b) }))
//!     .param("a", TypeTag::Number)
//!     .param("b", TypeTag::Number)
//!     .returns(TypeTag::Number)
//!     .validate(true);
//!
//! assert_eq!(add.signature_string(), "add(a=Number, b=Number) -> Number");
//! assert!(echo.is_safe());
//! ```

use polyrpc_core::{Arguments, Error, Result, Signature, TypeTag, Version};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every handler
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Output>> + Send>>;

/// Per-call execution context
///
/// The transport fills in `verb` and `metadata`; the dispatcher fills in the
/// request fields before the handler runs. Every handler receives its own
/// copy.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Method being invoked
    pub method: String,
    /// Declared protocol version of the request
    pub version: Version,
    /// Request id; `None` for notifications
    pub id: Option<Value>,
    /// Whether the request arrived as a batch element
    pub in_batch: bool,
    /// Declared signature of the procedure being invoked
    pub signature: Signature,
    /// Transport verb, e.g. `POST` or `GET`
    pub verb: Option<String>,
    /// Transport-supplied values (peer address, headers, auth, ...)
    pub metadata: HashMap<String, Value>,
}

impl CallContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the transport verb
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    /// Attach a transport-supplied value
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Transport-supplied value by key
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Whether the caller expects no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A value only a [`ResultEncoder`](crate::ResultEncoder) knows how to put
/// on the wire
pub struct Opaque {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Opaque {
    /// Wrap any value
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the wrapped value if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Rust type name of the wrapped value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

/// What a procedure returns
///
/// `Value`, `Tuple` and `Set` are wire-native. `Tuple` and `Set` are sent as
/// arrays. `Custom` values go through the site's result encoder and fail the
/// call when the encoder rejects them.
#[derive(Debug)]
pub enum Output {
    /// Any JSON value
    Value(Value),
    /// Fixed-size heterogeneous sequence
    Tuple(Vec<Value>),
    /// Unordered collection of distinct values
    Set(Vec<Value>),
    /// Value needing a custom encoder
    Custom(Opaque),
}

impl Output {
    /// Wrap a value for the result encoder
    pub fn custom<T: Any + Send>(value: T) -> Self {
        Output::Custom(Opaque::new(value))
    }

    /// Build a set, dropping repeated values but keeping first-seen order
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        let mut distinct: Vec<Value> = Vec::new();
        for value in values {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        Output::Set(distinct)
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl From<Opaque> for Output {
    fn from(value: Opaque) -> Self {
        Output::Custom(value)
    }
}

/// Trait for procedure implementations
pub trait Handler: Send + Sync {
    /// Invoke the procedure with the call context and decoded arguments
    ///
    /// Taxonomy errors returned here reach the caller unchanged; anything
    /// else is reported as an Internal error.
    fn call(&self, ctx: CallContext, args: Arguments) -> HandlerResult;
}

struct FnHandler<F> {
    func: F,
}

impl<F, Fut, O> Handler for FnHandler<F>
where
    F: Fn(CallContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<Output> + 'static,
{
    fn call(&self, ctx: CallContext, args: Arguments) -> HandlerResult {
        let fut = (self.func)(ctx, args);
        Box::pin(async move {
            let output: Output = fut.await?.into();
            Ok::<_, Error>(output)
        })
    }
}

/// Create a handler from an async function over the raw context and arguments
///
/// The function may return anything convertible into [`Output`], usually a
/// `serde_json::Value`.
///
/// ```rust
/// use polyrpc_server::from_fn;
/// use polyrpc_core::Error;
/// use serde_json::json;
///
/// let whoami = from_fn(|ctx, _args| async move {
///     ctx.get_metadata("user")
///         .cloned()
///         .ok_or_else(|| Error::Server("anonymous caller".into()))
/// });
/// ```
pub fn from_fn<F, Fut, O>(func: F) -> Box<dyn Handler>
where
    F: Fn(CallContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<Output> + 'static,
{
    Box::new(FnHandler { func })
}

/// Create a handler with automatic conversion on both sides
///
/// Keyword arguments are deserialized from an object, positional arguments
/// from an array, so a derived struct accepts either form. Arguments that
/// mix both forms (1.1 `{"0": 1, "b": 2}`) are bound to the declared
/// parameter names first and deserialized from the resulting object; without
/// a declared signature they are rejected with Invalid Params, as is anything
/// `P` cannot be deserialized from. The return value is serialized with serde.
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    // Arc lets each invocation own a handle to the closure
    let func = Arc::new(func);

    from_fn(move |ctx: CallContext, args: Arguments| {
        let func = Arc::clone(&func);
        async move {
            let params: P = serde_json::from_value(typed_params(&ctx.signature, args)?)
                .map_err(|e| Error::InvalidParams(e.to_string()))?;

            let result = func(params).await?;

            serde_json::to_value(result)
                .map(Output::Value)
                .map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}

/// Single JSON value a typed handler deserializes its params from
fn typed_params(signature: &Signature, args: Arguments) -> Result<Value> {
    let mixed = !args.positional.is_empty() && !args.keyword.is_empty();
    if mixed && signature.arity() > 0 {
        args.bind(signature).map(Value::Object)
    } else {
        args.into_value()
    }
}

/// A registered procedure: handler plus static metadata
///
/// Metadata is fixed once the procedure is registered.
pub struct Procedure {
    name: String,
    handler: Arc<dyn Handler>,
    signature: Signature,
    safe: bool,
    validate: bool,
    summary: String,
    describes_site: bool,
}

impl Procedure {
    /// Create a procedure with no declared parameters, returning `Any`
    pub fn new(name: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            handler: Arc::from(handler),
            signature: Signature::new(),
            safe: false,
            validate: false,
            summary: String::new(),
            describes_site: false,
        }
    }

    /// Declare the next parameter
    pub fn param(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.signature = self.signature.param(name, tag);
        self
    }

    /// Declare the return type
    pub fn returns(mut self, tag: TypeTag) -> Self {
        self.signature = self.signature.returns(tag);
        self
    }

    /// Replace the whole signature
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Allow calls through the read-only GET shortcut
    pub fn safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Check arity and types before every call
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Set the free-text description
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub(crate) fn describing_site(mut self) -> Self {
        self.describes_site = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    pub fn declared(&self) -> &Signature {
        &self.signature
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    pub fn summary_text(&self) -> &str {
        &self.summary
    }

    /// Whether this is the site's own self-description procedure
    pub fn describes_site(&self) -> bool {
        self.describes_site
    }

    /// Signature rendered for error messages, e.g. `add(a=Number) -> Number`
    pub fn signature_string(&self) -> String {
        self.signature.render(&self.name)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("safe", &self.safe)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}
