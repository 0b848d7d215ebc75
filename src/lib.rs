//! Request tracking middleware for tower/axum services.
//!
//! Wraps each request/response exchange with measurement and correlation:
//! an eligibility check, early capture of request identity, a correlated
//! operation at the telemetry sink, timing around the downstream call, and
//! outcome classification from the final status or a raised fault.

pub mod config;
pub mod middleware;
pub mod telemetry;

pub use config::TrackingConfig;
pub use middleware::correlation::CorrelationIdLayer;
pub use middleware::tracking::TrackingLayer;
pub use telemetry::correlation::{
    CorrelationId, CorrelationIdExt, InvalidCorrelationId, X_CORRELATION_ID,
};
pub use telemetry::record::{ExceptionTelemetry, OperationHandle, RequestTelemetry};
pub use telemetry::sink::{InMemorySink, LoggingSink, SinkError, TelemetrySink};
