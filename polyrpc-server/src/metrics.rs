//! Dispatch metrics
//!
//! OpenTelemetry instruments recorded by the dispatcher when metrics are
//! enabled on the site builder. They go through the global meter provider,
//! so nothing is exported until `polyrpc_core::init_observability` installs
//! one.
//!
//! - **requests_total**: dispatched requests by method, version and outcome (counter)
//! - **request_duration**: time spent per request in seconds (histogram)
//! - **batch_size**: number of elements per batch (histogram)
//! - **errors_total**: failures by taxonomy code (counter)
//! - **notifications_total**: requests dispatched without a response (counter)

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    InstrumentationScope, KeyValue,
};
use polyrpc_core::{ErrorKind, Version};

/// Metric instruments for the dispatcher
pub struct DispatchMetrics {
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub batch_size: Histogram<u64>,
    pub errors_total: Counter<u64>,
    pub notifications_total: Counter<u64>,
}

impl DispatchMetrics {
    /// Create instruments on a meter scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::new_with_meter(&global::meter_with_scope(scope))
    }

    /// Create instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("polyrpc.dispatch.requests.total")
                .with_description("Total number of requests dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("polyrpc.dispatch.request.duration")
                .with_description("Request dispatch duration in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("polyrpc.dispatch.batch.size")
                .with_description("Number of elements in batch requests")
                .build(),
            errors_total: meter
                .u64_counter("polyrpc.dispatch.errors.total")
                .with_description("Total number of error envelopes produced")
                .build(),
            notifications_total: meter
                .u64_counter("polyrpc.dispatch.notifications.total")
                .with_description("Total number of notifications dispatched")
                .build(),
        }
    }

    /// Record one dispatched request
    pub fn record_request(&self, method: &str, version: Version, outcome: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("version", version.as_str()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record a batch
    pub fn record_batch(&self, size: u64, mode: &str) {
        self.batch_size
            .record(size, &[KeyValue::new("mode", mode.to_string())]);
    }

    /// Record an error envelope
    pub fn record_error(&self, kind: ErrorKind, code: i32) {
        let attributes = &[
            KeyValue::new("error_type", kind.label()),
            KeyValue::new("code", i64::from(code)),
        ];
        self.errors_total.add(1, attributes);
    }

    /// Record a notification
    pub fn record_notification(&self, method: &str) {
        self.notifications_total
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }
}
