//! Parameter codec and wire helpers
//!
//! The parameter codec turns the wire-level `params` value into the
//! positional and keyword arguments a procedure receives. Each protocol
//! version reads `params` differently:
//!
//! - **1.0**: `params` must be an array; it is passed positionally.
//! - **2.0**: an array is passed positionally, an object by keyword.
//! - **1.1**: an object is split in two. Keys that parse as base-10 integers
//!   are positional slots, ordered by their integer value; all other keys are
//!   keywords. An array is passed positionally. Anything else decodes to no
//!   arguments at all.
//!
//! Numeric-looking keys only ever land in the positional part, never in the
//! keyword part. Gaps in the numbering are closed up rather than filled with
//! `null`:
//!
//! ```rust
//! use polyrpc_core::{codec, Version};
//! use serde_json::json;
//!
//! let args = codec::decode_params(Version::V1_1, &json!({"0": "a", "2": "c", "x": 1})).unwrap();
//! assert_eq!(args.positional, vec![json!("a"), json!("c")]);
//! assert_eq!(args.keyword.get("x"), Some(&json!(1)));
//! assert_eq!(args.keyword.len(), 1);
//! ```
//!
//! The module also carries description mode (the `{name, type}` list used by
//! self-description) and the JSON encode/decode helpers used at the transport
//! edge.

use crate::error::{Error, Result};
use crate::signature::{Signature, TypeTag};
use crate::types::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Decoded arguments handed to a procedure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    /// Arguments passed by position
    pub positional: Vec<Value>,
    /// Arguments passed by name
    pub keyword: Map<String, Value>,
}

impl Arguments {
    /// Arguments made only of positional values
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keyword: Map::new(),
        }
    }

    /// Arguments made only of keyword values
    pub fn keyword(values: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            keyword: values,
        }
    }

    /// Check if no argument was passed at all
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument called `name`
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Collapse into a single JSON value
    ///
    /// Keyword-only arguments become an object, everything else an array.
    /// Arguments that mix both forms cannot be collapsed without knowing the
    /// parameter names; use [`Arguments::bind`] for those.
    pub fn into_value(self) -> Result<Value> {
        match (self.positional.is_empty(), self.keyword.is_empty()) {
            (true, false) => Ok(Value::Object(self.keyword)),
            (_, true) => Ok(Value::Array(self.positional)),
            (false, false) => Err(Error::InvalidParams(
                "Cannot mix positional and keyword arguments here".to_string(),
            )),
        }
    }

    /// Bind arguments to declared parameter names
    ///
    /// Positional values fill the declared parameters in order, then keyword
    /// values fill the rest by name. Passing a value twice, passing more
    /// positional values than declared, or naming an undeclared parameter is
    /// an Invalid Params error.
    pub fn bind(&self, signature: &Signature) -> Result<Map<String, Value>> {
        let declared = signature.params();
        if self.positional.len() > declared.len() {
            return Err(Error::InvalidParams(format!(
                "Too many positional arguments: expected at most {}, got {}",
                declared.len(),
                self.positional.len()
            )));
        }

        let mut bound: Map<String, Value> = declared
            .iter()
            .zip(self.positional.iter())
            .map(|((name, _), value)| (name.clone(), value.clone()))
            .collect();

        for (name, value) in &self.keyword {
            if signature.tag_of(name).is_none() {
                return Err(Error::InvalidParams(format!(
                    "Unexpected keyword argument '{}'",
                    name
                )));
            }
            if bound.insert(name.clone(), value.clone()).is_some() {
                return Err(Error::InvalidParams(format!(
                    "Got multiple values for argument '{}'",
                    name
                )));
            }
        }

        Ok(bound)
    }
}

/// Decode wire `params` according to the request's version
///
/// # Errors
///
/// 1.0 requests whose params are not an array, and 2.0 requests whose params
/// are neither an array nor an object, fail with `Error::InvalidParams`.
/// 1.1 decoding never fails.
pub fn decode_params(version: Version, params: &Value) -> Result<Arguments> {
    match (version, params) {
        (_, Value::Array(values)) => Ok(Arguments::positional(values.clone())),
        (Version::V1_0, other) => Err(Error::InvalidParams(format!(
            "JSON-RPC 1.0 params must be an array, got {}",
            TypeTag::of(other)
        ))),
        (Version::V2_0, Value::Object(map)) => Ok(Arguments::keyword(map.clone())),
        (Version::V2_0, other) => Err(Error::InvalidParams(format!(
            "JSON-RPC 2.0 params must be an array or an object, got {}",
            TypeTag::of(other)
        ))),
        (Version::V1_1, _) => Ok(Arguments {
            positional: positional_args_v11(params),
            keyword: keyword_args_v11(params),
        }),
    }
}

/// Keyword part of 1.1 params: every key that does not parse as an integer
pub fn keyword_args_v11(params: &Value) -> Map<String, Value> {
    match params {
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| parse_index_key(key).is_none())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Map::new(),
    }
}

/// Positional part of 1.1 params
///
/// An array is returned as is. For an object, the values under integer keys
/// are returned in ascending key order, one value per distinct integer. When
/// two keys spell the same integer (`"1"` and `"01"`), the canonical spelling
/// wins, otherwise the first one seen.
pub fn positional_args_v11(params: &Value) -> Vec<Value> {
    match params {
        Value::Array(values) => values.clone(),
        Value::Object(map) => {
            let mut slots: BTreeMap<IndexKey, &Value> = BTreeMap::new();
            for (key, value) in map {
                let Some(index) = parse_index_key(key) else {
                    continue;
                };
                if index.to_string() == *key {
                    slots.insert(index, value);
                } else {
                    slots.entry(index).or_insert(value);
                }
            }
            slots.into_values().cloned().collect()
        }
        _ => Vec::new(),
    }
}

/// Integer value of a 1.1 params key, of any magnitude
///
/// Kept as a sign plus a decimal magnitude without leading zeros, so keys
/// too large for a machine integer still order numerically.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexKey {
    negative: bool,
    magnitude: String,
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let by_magnitude = self
            .magnitude
            .len()
            .cmp(&other.magnitude.len())
            .then_with(|| self.magnitude.cmp(&other.magnitude));
        match (self.negative, other.negative) {
            (false, false) => by_magnitude,
            (true, true) => by_magnitude.reverse(),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str(&self.magnitude)
    }
}

/// Parse a params key as a base-10 integer
///
/// Surrounding whitespace and a leading sign are accepted.
fn parse_index_key(key: &str) -> Option<IndexKey> {
    let key = key.trim();
    let (negative, digits) = match key.as_bytes().first()? {
        b'-' => (true, &key[1..]),
        b'+' => (false, &key[1..]),
        _ => (false, key),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let trimmed = digits.trim_start_matches('0');
    let magnitude = if trimmed.is_empty() { "0" } else { trimmed };
    Some(IndexKey {
        negative: negative && magnitude != "0",
        magnitude: magnitude.to_string(),
    })
}

/// One entry of a procedure's parameter list in self-description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescription {
    /// Declared parameter name
    pub name: String,
    /// Declared parameter type
    #[serde(rename = "type")]
    pub kind: TypeTag,
}

/// Description mode: the ordered `{name, type}` list of a signature
pub fn describe_params(signature: &Signature) -> Vec<ParamDescription> {
    signature
        .params()
        .iter()
        .map(|(name, tag)| ParamDescription {
            name: name.clone(),
            kind: *tag,
        })
        .collect()
}

/// Decode a raw payload into a JSON value
///
/// # Errors
///
/// Returns `Error::Parse` if the bytes are not valid UTF-8 JSON.
pub fn decode_payload(data: &[u8]) -> Result<Value> {
    serde_json::from_slice(data).map_err(|e| Error::Parse(e.to_string()))
}

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}
