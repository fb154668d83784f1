//! Batch processing
//!
//! A top-level array is a batch: every element is dispatched on its own with
//! the batch flag set, and the envelopes come back in input order. One
//! failing element never affects its siblings, and the batch as a whole is
//! always answered with status 200.
//!
//! Inside a batch a notification is an Invalid Request, so every element
//! normally yields an envelope. The reply still has one slot per element;
//! a slot that produced no envelope is written as `null`.
//!
//! # Batch Modes
//!
//! - **Parallel**: every element runs in its own Tokio task
//! - **Sequential**: elements run one after another, in order
//!
//! Both modes preserve output order.
//!
//! # Size Limiting
//!
//! With a maximum size configured, an oversized batch is not processed:
//! [`BatchProcessor::process_batch`] fails with an Invalid Request error,
//! which the site answers with a single envelope rather than an array.
//!
//! ```rust
//! use polyrpc_server::{BatchMode, BatchProcessor};
//!
//! let processor = BatchProcessor::with_limit(BatchMode::Parallel, Some(100));
//! let sequential = BatchProcessor::new(BatchMode::Sequential);
//! ```

use crate::dispatcher::{panic_error, Dispatcher};
use crate::procedure::CallContext;
use polyrpc_core::{Error, JsonRpcErrorData, Response, Result, Version};
use serde_json::Value;

/// Mode for processing batch requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Process all elements concurrently
    #[default]
    Parallel,
    /// Process elements one at a time, in order
    Sequential,
}

impl BatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

/// Processor for handling batch requests
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
}

impl BatchProcessor {
    /// Create a new batch processor with the specified mode
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            max_size: None,
        }
    }

    /// Create a new batch processor with mode and max batch size
    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self { mode, max_size }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Check a batch length against the configured limit
    pub fn check_size(&self, size: usize) -> Result<()> {
        match self.max_size {
            Some(max_size) if size > max_size => {
                tracing::warn!(batch_size = size, max_size = max_size, "Batch size exceeded");
                Err(Error::JsonRpc(JsonRpcErrorData::batch_size_exceeded(
                    max_size, size,
                )))
            }
            _ => Ok(()),
        }
    }

    /// Dispatch every element of a batch
    ///
    /// # Errors
    ///
    /// Returns Invalid Request, without dispatching anything, when the batch
    /// is larger than the configured limit.
    #[tracing::instrument(skip(self, ctx, batch, dispatcher), fields(batch_size = batch.len(), mode = ?self.mode))]
    pub async fn process_batch(
        &self,
        ctx: &CallContext,
        batch: Vec<Value>,
        dispatcher: &Dispatcher,
    ) -> Result<Vec<Option<Response>>> {
        self.check_size(batch.len())?;

        if let Some(metrics) = dispatcher.metrics() {
            metrics.record_batch(batch.len() as u64, self.mode.as_str());
        }

        let responses = match self.mode {
            BatchMode::Parallel => process_parallel(ctx, batch, dispatcher).await,
            BatchMode::Sequential => process_sequential(ctx, batch, dispatcher).await,
        };

        tracing::debug!(response_count = responses.len(), "Batch processing completed");
        Ok(responses)
    }
}

async fn process_parallel(
    ctx: &CallContext,
    batch: Vec<Value>,
    dispatcher: &Dispatcher,
) -> Vec<Option<Response>> {
    let tasks: Vec<_> = batch
        .into_iter()
        .map(|raw| {
            let dispatcher = dispatcher.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { dispatcher.dispatch(ctx, &raw, true).await.0 })
        })
        .collect();

    // Awaiting in spawn order keeps the output aligned with the input
    let mut responses = Vec::with_capacity(tasks.len());
    for task in tasks {
        let response = match task.await {
            Ok(response) => response,
            Err(join_error) => {
                tracing::error!(error = %join_error, "Batch element task failed");
                let error = match join_error.try_into_panic() {
                    Ok(payload) => panic_error(payload.as_ref()),
                    Err(other) => Error::Internal(other.to_string()),
                };
                Some(Response::error(
                    Version::V1_0,
                    Value::Null,
                    error.to_error_data(dispatcher.is_debug()),
                ))
            }
        };
        responses.push(response);
    }
    responses
}

async fn process_sequential(
    ctx: &CallContext,
    batch: Vec<Value>,
    dispatcher: &Dispatcher,
) -> Vec<Option<Response>> {
    let mut responses = Vec::with_capacity(batch.len());
    for raw in &batch {
        responses.push(dispatcher.dispatch(ctx.clone(), raw, true).await.0);
    }
    responses
}
