//! Telemetry records and operation handles.
//!
//! # Responsibilities
//! - Define the request record (identity, timing, outcome, properties)
//! - Define the exception record correlated to its enclosing request
//! - Tie an open operation to its eventual stop via an opaque handle
//!
//! # Design Decisions
//! - Records derive Serde so sinks can ship them as JSON without help
//! - Identity fields (name, method, URL) are fixed at construction; outcome
//!   fields (duration, success, response code) are written at stop time
//! - The handle owns its record while the operation is open, so there is
//!   exactly one writer and exactly one stop per start

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use super::correlation::CorrelationId;

/// Telemetry for one tracked request/response exchange.
#[derive(Debug, Clone, Serialize)]
pub struct RequestTelemetry {
    /// Correlation ID shared with any exception records for this exchange.
    pub id: CorrelationId,
    /// `"<METHOD> <PATH>"`, from the request as it arrived.
    pub name: String,
    /// Wall-clock time the exchange entered the middleware.
    pub timestamp: SystemTime,
    pub method: String,
    pub url: String,
    /// Elapsed time of the downstream call. Written at stop.
    pub duration: Duration,
    /// `status < 400`, from the final response. Written at stop.
    pub success: bool,
    /// Final status as a string; the fault path sets it first, otherwise it
    /// is filled from the response at stop.
    pub response_code: Option<String>,
    /// Extra properties from the configured enricher, last write wins.
    pub properties: HashMap<String, String>,
}

impl RequestTelemetry {
    /// Capture the identity of an exchange. Outcome fields start unset and
    /// are written when the operation stops.
    pub fn new(id: CorrelationId, method: &str, path: &str, url: String) -> Self {
        Self {
            id,
            name: format!("{method} {path}"),
            timestamp: SystemTime::now(),
            method: method.to_string(),
            url,
            duration: Duration::ZERO,
            success: false,
            response_code: None,
            properties: HashMap::new(),
        }
    }

    /// Merge enrichment pairs into the property map. Later pairs overwrite
    /// earlier ones with the same key.
    pub fn extend_properties<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.properties.extend(pairs);
    }
}

/// Telemetry for a fault raised by the downstream call.
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionTelemetry {
    /// Correlation ID of the enclosing request record.
    pub operation_id: CorrelationId,
    pub message: String,
    pub timestamp: SystemTime,
}

impl ExceptionTelemetry {
    pub fn new(operation_id: CorrelationId, message: String) -> Self {
        Self {
            operation_id,
            message,
            timestamp: SystemTime::now(),
        }
    }
}

/// Token returned by [`TelemetrySink::start_operation`], required to stop it.
///
/// Owns the request record while the operation is open. Consumed by
/// `stop_operation`; one stop per start, on every exit path.
///
/// [`TelemetrySink::start_operation`]: super::sink::TelemetrySink::start_operation
#[derive(Debug)]
pub struct OperationHandle {
    telemetry: RequestTelemetry,
}

impl OperationHandle {
    pub fn new(telemetry: RequestTelemetry) -> Self {
        Self { telemetry }
    }

    pub fn telemetry(&self) -> &RequestTelemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut RequestTelemetry {
        &mut self.telemetry
    }

    pub fn into_telemetry(self) -> RequestTelemetry {
        self.telemetry
    }
}
