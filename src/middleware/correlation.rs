//! Correlation ID middleware.
//!
//! # Responsibilities
//! - Ensure every request carries a correlation ID, as early as possible
//! - Reuse a valid inbound `x-request-id` from an upstream proxy, mint a
//!   fresh UUID otherwise
//! - Install the ID as a request extension and header, and echo it on the
//!   response so clients can reference it
//!
//! # Design Decisions
//! - The extension is the authoritative copy; the tracking middleware and
//!   handlers read it instead of re-parsing headers
//! - Invalid inbound values are replaced, not propagated

use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::telemetry::correlation::{CorrelationId, X_CORRELATION_ID};

/// Installs a [`CorrelationId`] on every request passing through.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationIdLayer;

impl CorrelationIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdService { inner }
    }
}

/// Service produced by [`CorrelationIdLayer`].
#[derive(Debug, Clone)]
pub struct CorrelationIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let id = req
            .headers()
            .get(X_CORRELATION_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<CorrelationId>().ok())
            .unwrap_or_default();

        // Parsed IDs are visible ASCII, so the header value conversion
        // cannot fail.
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            req.headers_mut().insert(X_CORRELATION_ID, value);
        }
        req.extensions_mut().insert(id.clone());

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                response.headers_mut().insert(X_CORRELATION_ID, value);
            }
            Ok(response)
        })
    }
}
