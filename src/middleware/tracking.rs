//! Request tracking middleware.
//!
//! # Responsibilities
//! - Gate each exchange on the configured tracking predicate
//! - Capture request identity before the downstream call can consume it
//! - Bracket the downstream call with a correlated sink operation and an
//!   elapsed-time measurement
//! - Classify the outcome from the final status or a raised fault and stop
//!   the operation exactly once on every exit path
//!
//! # Design Decisions
//! - Identity (method, path, URL, name) is read before `inner.call`; the
//!   request is moved into the downstream service and its final state is
//!   only consulted for the status code
//! - Downstream faults are captured as exception records and returned to
//!   the caller unchanged; tracking never swallows a fault
//! - Sink failures are logged and the request keeps going; telemetry is
//!   not allowed to fail a request (see DESIGN.md)

use std::fmt::Display;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::config::TrackingConfig;
use crate::telemetry::correlation::{CorrelationId, X_CORRELATION_ID};
use crate::telemetry::record::{ExceptionTelemetry, RequestTelemetry};
use crate::telemetry::sink::TelemetrySink;

/// Response code recorded when the downstream call raises a fault instead
/// of producing a response.
const FAULT_RESPONSE_CODE: &str = "InternalServerError";

/// Tracks request/response exchanges into a [`TelemetrySink`].
pub struct TrackingLayer<Sink> {
    sink: Arc<Sink>,
    config: Arc<TrackingConfig>,
}

impl<Sink> TrackingLayer<Sink> {
    /// Track every exchange, with no enrichment.
    pub fn new(sink: Sink) -> Self {
        Self::with_config(sink, TrackingConfig::default())
    }

    /// Track exchanges according to `config`.
    pub fn with_config(sink: Sink, config: TrackingConfig) -> Self {
        Self {
            sink: Arc::new(sink),
            config: Arc::new(config),
        }
    }
}

impl<Sink> Clone for TrackingLayer<Sink> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Sink> Layer<S> for TrackingLayer<Sink> {
    type Service = TrackingService<S, Sink>;

    fn layer(&self, inner: S) -> Self::Service {
        TrackingService {
            inner,
            sink: Arc::clone(&self.sink),
            config: Arc::clone(&self.config),
        }
    }
}

/// Service produced by [`TrackingLayer`].
pub struct TrackingService<S, Sink> {
    inner: S,
    sink: Arc<Sink>,
    config: Arc<TrackingConfig>,
}

impl<S: Clone, Sink> Clone for TrackingService<S, Sink> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sink: Arc::clone(&self.sink),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Sink, ReqBody, ResBody> Service<Request<ReqBody>> for TrackingService<S, Sink>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Display,
    Sink: TelemetrySink + Send + Sync + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // 1. Eligibility gate. Untracked exchanges pass through with no
        // telemetry and no timer.
        let (parts, body) = req.into_parts();
        if !self.config.should_track(&parts) {
            let req = Request::from_parts(parts, body);
            return Box::pin(async move { inner.call(req).await });
        }

        // 2. Early capture. Identity must be read before the request is
        // moved into the downstream service.
        let id = parts
            .extensions
            .get::<CorrelationId>()
            .cloned()
            .or_else(|| {
                // No correlation layer installed; fall back to the raw
                // header, then to a fresh id so the record is never
                // emitted without identity.
                parts
                    .headers
                    .get(X_CORRELATION_ID)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<CorrelationId>().ok())
            })
            .unwrap_or_default();
        let mut record = RequestTelemetry::new(
            id,
            parts.method.as_str(),
            parts.uri.path(),
            parts.uri.to_string(),
        );
        record.extend_properties(self.config.enrich(&parts));
        let req = Request::from_parts(parts, body);

        let sink = Arc::clone(&self.sink);

        Box::pin(async move {
            // 3. Start the correlated operation.
            let operation = match sink.start_operation(record) {
                Ok(operation) => Some(operation),
                Err(error) => {
                    tracing::error!(
                        error = %error,
                        "Failed to start tracking operation; exchange proceeds untracked"
                    );
                    None
                }
            };

            // 4. Invoke downstream, measured.
            let started = Instant::now();
            let outcome = inner.call(req).await;
            let elapsed = started.elapsed();

            let Some(mut operation) = operation else {
                return outcome;
            };

            // 5. Fault path: capture the exception immediately, correlated
            // to this operation. The fault itself is returned unchanged.
            if let Err(error) = &outcome {
                let exception =
                    ExceptionTelemetry::new(operation.telemetry().id.clone(), error.to_string());
                if let Err(sink_error) = sink.track_exception(exception) {
                    tracing::error!(error = %sink_error, "Failed to track downstream fault");
                }
                operation.telemetry_mut().response_code =
                    Some(FAULT_RESPONSE_CODE.to_string());
            }

            // 6. Finalize exactly once, on both paths.
            let status = outcome.as_ref().ok().map(|response| response.status());
            let telemetry = operation.telemetry_mut();
            telemetry.duration = elapsed;
            telemetry.success = status.is_some_and(|s| s.as_u16() < 400);
            if telemetry.response_code.is_none() {
                telemetry.response_code = status.map(|s| s.as_u16().to_string());
            }

            tracing::debug!(
                operation_id = %telemetry.id,
                name = %telemetry.name,
                success = telemetry.success,
                duration_ms = elapsed.as_millis() as u64,
                "Exchange tracked"
            );

            if let Err(error) = sink.stop_operation(operation) {
                tracing::error!(error = %error, "Failed to stop tracking operation");
            }
            outcome
        })
    }
}
