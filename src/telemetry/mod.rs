//! Telemetry subsystem.
//!
//! # Data Flow
//! ```text
//! Tracking middleware produces:
//!     → record.rs (request + exception records, operation handles)
//!     → correlation.rs (per-request correlation IDs)
//!
//! Consumers:
//!     → sink.rs (TelemetrySink trait: the backend boundary)
//!     → LoggingSink (structured log lines + metrics)
//!     → InMemorySink (test and in-process inspection)
//! ```
//!
//! # Design Decisions
//! - Records are plain serializable data; transport is the sink's business
//! - Correlation ID is explicit per-request context, never a process global
//! - One operation handle per tracked exchange, consumed exactly once

pub mod correlation;
pub mod record;
pub mod sink;

pub use correlation::{CorrelationId, CorrelationIdExt, InvalidCorrelationId, X_CORRELATION_ID};
pub use record::{ExceptionTelemetry, OperationHandle, RequestTelemetry};
pub use sink::{InMemorySink, LoggingSink, SinkError, TelemetrySink};
