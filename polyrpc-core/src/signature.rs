//! Declared parameter types and procedure signatures
//!
//! Procedures declare the type of every parameter and of their return value
//! using a closed set of tags. The dispatcher classifies incoming JSON values
//! with [`TypeTag::of`] and compares tags, so validation never needs runtime
//! type introspection.
//!
//! # Classification
//!
//! | JSON value         | tag       |
//! |--------------------|-----------|
//! | object             | `Object`  |
//! | array              | `Array`   |
//! | string             | `String`  |
//! | number (any)       | `Number`  |
//! | `true` / `false`   | `Boolean` |
//! | `null`             | `Nil`     |
//!
//! `Any` is never produced by the classifier; as a declared tag it accepts
//! every value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declared type of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeTag {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Nil,
    #[default]
    Any,
}

impl TypeTag {
    /// Classify a JSON value
    pub fn of(value: &Value) -> TypeTag {
        match value {
            Value::Object(_) => TypeTag::Object,
            Value::Array(_) => TypeTag::Array,
            Value::String(_) => TypeTag::String,
            Value::Number(_) => TypeTag::Number,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Null => TypeTag::Nil,
        }
    }

    /// Whether a value conforms to this declared tag
    pub fn accepts(self, value: &Value) -> bool {
        self == TypeTag::Any || TypeTag::of(value) == self
    }

    /// Name used in signatures and self-description
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Object => "Object",
            TypeTag::Array => "Array",
            TypeTag::String => "String",
            TypeTag::Number => "Number",
            TypeTag::Boolean => "Boolean",
            TypeTag::Nil => "Nil",
            TypeTag::Any => "Any",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered parameter declarations plus return type of a procedure
///
/// Parameter order matters: positional arguments are compared against the
/// declarations by index, named arguments by key.
///
/// # Examples
///
/// ```rust
/// use polyrpc_core::{Signature, TypeTag};
///
/// let sig = Signature::new()
///     .param("a", TypeTag::Number)
///     .param("b", TypeTag::String)
///     .returns(TypeTag::String);
///
/// assert_eq!(sig.arity(), 2);
/// assert_eq!(sig.render("concat"), "concat(a=Number, b=String) -> String");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<(String, TypeTag)>,
    returns: TypeTag,
}

impl Signature {
    /// Empty signature returning `Any`
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter declaration
    ///
    /// Declaring a name twice replaces the earlier type but keeps its slot.
    pub fn param(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        let name = name.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = tag,
            None => self.params.push((name, tag)),
        }
        self
    }

    /// Set the declared return type
    pub fn returns(mut self, tag: TypeTag) -> Self {
        self.returns = tag;
        self
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Declared parameters in order
    pub fn params(&self) -> &[(String, TypeTag)] {
        &self.params
    }

    /// Declared type of the parameter at `index`
    pub fn tag_at(&self, index: usize) -> Option<TypeTag> {
        self.params.get(index).map(|(_, tag)| *tag)
    }

    /// Declared type of the parameter called `name`
    pub fn tag_of(&self, name: &str) -> Option<TypeTag> {
        self.params
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, tag)| *tag)
    }

    /// Declared return type
    pub fn return_type(&self) -> TypeTag {
        self.returns
    }

    /// Human-readable rendering used in error messages
    pub fn render(&self, method: &str) -> String {
        let params = self
            .params
            .iter()
            .map(|(name, tag)| format!("{}={}", name, tag))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) -> {}", method, params, self.returns)
    }
}
