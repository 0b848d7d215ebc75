//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → correlation.rs (install per-request correlation ID)
//!     → tracking.rs (gate, capture identity, start operation)
//!     → [rest of the pipeline]
//!     → tracking.rs (classify outcome, stop operation)
//!     → Response to client (correlation ID echoed in header)
//! ```
//!
//! # Design Decisions
//! - Both layers are plain tower `Layer`/`Service` pairs so any tower or
//!   axum stack can install them in the usual way
//! - The tracking layer wraps a fallible inner service; the `Err` channel
//!   is the fault path and is always returned to the caller unchanged

pub mod correlation;
pub mod tracking;

pub use correlation::CorrelationIdLayer;
pub use tracking::TrackingLayer;
