//! Telemetry sink boundary.
//!
//! # Responsibilities
//! - Define the four capabilities the tracking middleware consumes:
//!   start operation, stop operation, track exception, and (implicitly)
//!   transport, which belongs entirely to the implementation
//! - Ship a logging sink for production-style JSON output and an in-memory
//!   sink for tests and in-process inspection
//!
//! # Design Decisions
//! - Sinks must be safe for many concurrent callers; implementations here
//!   use interior mutability, the middleware shares them behind an `Arc`
//! - A record is emitted at stop, when its outcome fields are final
//! - Sink failures surface as `SinkError`; the middleware logs them and
//!   keeps serving rather than letting telemetry take down a request

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::record::{ExceptionTelemetry, OperationHandle, RequestTelemetry};

/// Failure while submitting telemetry to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode telemetry record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// The external telemetry backend, as seen by the tracking middleware.
///
/// Batching, flushing, and transport to the ingestion service are the
/// implementation's concern; callers only open, close, and annotate
/// operations.
pub trait TelemetrySink {
    /// Register `telemetry` as the active correlated operation.
    ///
    /// The returned handle owns the record until [`stop_operation`] consumes
    /// it; callers must stop every operation they start, on every exit path.
    ///
    /// [`stop_operation`]: TelemetrySink::stop_operation
    fn start_operation(&self, telemetry: RequestTelemetry) -> Result<OperationHandle, SinkError>;

    /// Close a started operation and emit its record.
    fn stop_operation(&self, operation: OperationHandle) -> Result<(), SinkError>;

    /// Submit an exception record, correlated to its enclosing operation by
    /// `operation_id`. Sent immediately, not deferred to the stop.
    fn track_exception(&self, telemetry: ExceptionTelemetry) -> Result<(), SinkError>;
}

/// Sink that emits finished records as JSON log lines and updates the
/// `tracked_requests_total` counter and `tracked_request_duration_seconds`
/// histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl LoggingSink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for LoggingSink {
    fn start_operation(&self, telemetry: RequestTelemetry) -> Result<OperationHandle, SinkError> {
        tracing::debug!(
            operation_id = %telemetry.id,
            name = %telemetry.name,
            "Operation started"
        );
        Ok(OperationHandle::new(telemetry))
    }

    fn stop_operation(&self, operation: OperationHandle) -> Result<(), SinkError> {
        let telemetry = operation.into_telemetry();

        let status = telemetry.response_code.clone().unwrap_or_default();
        metrics::counter!(
            "tracked_requests_total",
            "method" => telemetry.method.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!("tracked_request_duration_seconds")
            .record(telemetry.duration.as_secs_f64());

        let line = serde_json::to_string(&telemetry)?;
        tracing::info!(target: "request_tracking::telemetry", telemetry = %line, "Request tracked");
        Ok(())
    }

    fn track_exception(&self, telemetry: ExceptionTelemetry) -> Result<(), SinkError> {
        metrics::counter!("tracked_exceptions_total").increment(1);

        let line = serde_json::to_string(&telemetry)?;
        tracing::error!(
            target: "request_tracking::telemetry",
            operation_id = %telemetry.operation_id,
            telemetry = %line,
            "Downstream fault tracked"
        );
        Ok(())
    }
}

/// Sink that collects records in memory.
///
/// Clones share storage, so a test can keep one handle and install another
/// on the middleware. `open_operations` counts started-but-not-stopped
/// operations; a finished exchange always leaves it at zero.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    inner: Arc<InMemoryInner>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    requests: Mutex<Vec<RequestTelemetry>>,
    exceptions: Mutex<Vec<ExceptionTelemetry>>,
    open: AtomicUsize,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the request records emitted so far.
    pub fn requests(&self) -> Vec<RequestTelemetry> {
        self.inner.requests.lock().expect("sink lock poisoned").clone()
    }

    /// Snapshot of the exception records emitted so far.
    pub fn exceptions(&self) -> Vec<ExceptionTelemetry> {
        self.inner.exceptions.lock().expect("sink lock poisoned").clone()
    }

    /// Operations started but not yet stopped.
    pub fn open_operations(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }
}

impl TelemetrySink for InMemorySink {
    fn start_operation(&self, telemetry: RequestTelemetry) -> Result<OperationHandle, SinkError> {
        self.inner.open.fetch_add(1, Ordering::SeqCst);
        Ok(OperationHandle::new(telemetry))
    }

    fn stop_operation(&self, operation: OperationHandle) -> Result<(), SinkError> {
        let mut requests = self
            .inner
            .requests
            .lock()
            .map_err(|_| SinkError::Unavailable("request store poisoned".to_string()))?;
        requests.push(operation.into_telemetry());
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn track_exception(&self, telemetry: ExceptionTelemetry) -> Result<(), SinkError> {
        let mut exceptions = self
            .inner
            .exceptions
            .lock()
            .map_err(|_| SinkError::Unavailable("exception store poisoned".to_string()))?;
        exceptions.push(telemetry);
        Ok(())
    }
}
