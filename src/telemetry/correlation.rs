//! Correlation identifiers.
//!
//! # Responsibilities
//! - Define the per-request correlation ID linking request and exception
//!   records for one logical exchange
//! - Validate IDs arriving from upstream proxies before trusting them
//! - Expose the ID to handlers via a request extension trait
//!
//! # Design Decisions
//! - The ID travels as an explicit request extension, not ambient state, so
//!   tests and handlers see exactly what the middleware saw
//! - Freshly generated IDs are UUID v4
//! - Inbound header values are length- and charset-checked; upstream
//!   proxies are not trusted blindly

use std::str::FromStr;

use axum::http::Request;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the correlation ID across process boundaries.
pub const X_CORRELATION_ID: &str = "x-request-id";

/// Longest inbound header value accepted as a correlation ID.
const MAX_ID_LEN: usize = 128;

/// Identifier linking all telemetry for one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound header value that cannot be used as a correlation ID.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid correlation id: {0:?}")]
pub struct InvalidCorrelationId(String);

impl FromStr for CorrelationId {
    type Err = InvalidCorrelationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > MAX_ID_LEN || !s.chars().all(|c| c.is_ascii_graphic()) {
            return Err(InvalidCorrelationId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Read the correlation ID attached to a request.
pub trait CorrelationIdExt {
    /// The ID installed by [`CorrelationIdLayer`], if the layer ran.
    ///
    /// [`CorrelationIdLayer`]: crate::middleware::correlation::CorrelationIdLayer
    fn correlation_id(&self) -> Option<&CorrelationId>;
}

impl<B> CorrelationIdExt for Request<B> {
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions().get::<CorrelationId>()
    }
}
