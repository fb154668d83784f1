//! Result packaging and the custom encoder hook
//!
//! Procedures return an [`Output`]. Wire-native variants go straight into the
//! envelope. Tuples and sets become arrays. An [`Output::Custom`] value is
//! offered to the site's [`ResultEncoder`]; if the encoder declines it, the
//! call fails with an Internal "Return type not supported" error.
//!
//! [`DefaultEncoder`] understands the types a web framework's JSON encoder
//! usually covers: `chrono` timestamps, dates and times (ISO 8601), UUIDs
//! (hyphenated) and durations (seconds, as a float).

use crate::procedure::{Opaque, Output};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use polyrpc_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Encoder for values that are not wire-native
pub trait ResultEncoder: Send + Sync {
    /// Encode a custom value, or return `None` to reject it
    fn encode(&self, value: &Opaque) -> Option<Value>;
}

/// Encoder for date/time, UUID and duration values
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoder;

impl ResultEncoder for DefaultEncoder {
    fn encode(&self, value: &Opaque) -> Option<Value> {
        if let Some(dt) = value.downcast_ref::<DateTime<Utc>>() {
            return Some(Value::String(dt.to_rfc3339()));
        }
        if let Some(dt) = value.downcast_ref::<DateTime<FixedOffset>>() {
            return Some(Value::String(dt.to_rfc3339()));
        }
        if let Some(dt) = value.downcast_ref::<DateTime<Local>>() {
            return Some(Value::String(dt.to_rfc3339()));
        }
        if let Some(dt) = value.downcast_ref::<NaiveDateTime>() {
            return Some(Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
        }
        if let Some(date) = value.downcast_ref::<NaiveDate>() {
            return Some(Value::String(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(time) = value.downcast_ref::<NaiveTime>() {
            return Some(Value::String(time.format("%H:%M:%S%.f").to_string()));
        }
        if let Some(id) = value.downcast_ref::<Uuid>() {
            return Some(Value::String(id.hyphenated().to_string()));
        }
        if let Some(duration) = value.downcast_ref::<Duration>() {
            return Some(Value::from(duration.as_secs_f64()));
        }
        if let Some(delta) = value.downcast_ref::<TimeDelta>() {
            return delta
                .num_microseconds()
                .map(|micros| Value::from(micros as f64 / 1_000_000.0));
        }
        None
    }
}

/// Turn a procedure's output into the `result` value
///
/// Any JSON value is wire-native, floats included: a float result is sent
/// as is rather than offered to the encoder and rejected.
pub fn package_result(output: Output, encoder: &dyn ResultEncoder) -> Result<Value> {
    match output {
        Output::Value(value) => Ok(value),
        Output::Tuple(values) | Output::Set(values) => Ok(Value::Array(values)),
        Output::Custom(opaque) => encoder
            .encode(&opaque)
            .ok_or_else(|| Error::UnsupportedType(opaque.type_name().to_string())),
    }
}
