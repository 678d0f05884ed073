//! Operation logging for the store.
//!
//! The store reports every operation to an injected [`StoreObserver`]. The
//! default [`TracingObserver`] turns events into `tracing` records; tests and
//! embedders can supply their own sink.

use std::time::Duration;

use crate::core::error::TaxonomyError;

/// A completed store operation
#[derive(Debug, Clone, Copy)]
pub struct OperationEvent<'a> {
    /// Operation name, e.g. `insert` or `reparent`
    pub operation: &'static str,

    /// Identifying fields of the arguments, e.g. `id=4 parent=2`
    pub target: &'a str,

    pub outcome: Result<(), &'a TaxonomyError>,

    pub duration: Duration,
}

impl OperationEvent<'_> {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Receives one event per store operation
pub trait StoreObserver: Send + Sync {
    fn on_operation(&self, event: &OperationEvent<'_>);
}

/// Emits store events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn on_operation(&self, event: &OperationEvent<'_>) {
        let duration_us = u64::try_from(event.duration.as_micros()).unwrap_or(u64::MAX);
        match event.outcome {
            Ok(()) => tracing::info!(
                operation = event.operation,
                args = event.target,
                duration_us,
                "store operation succeeded"
            ),
            Err(error) => tracing::warn!(
                operation = event.operation,
                args = event.target,
                duration_us,
                error_type = error.kind(),
                %error,
                "store operation failed"
            ),
        }
    }
}

/// Discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StoreObserver for NoopObserver {
    fn on_operation(&self, _event: &OperationEvent<'_>) {}
}
