//! Tracking policy configuration.
//!
//! # Responsibilities
//! - Decide which exchanges get tracked (predicate over request parts)
//! - Produce extra key/value properties for the request record (enricher)
//! - Substitute documented defaults for unset fields at construction
//!
//! # Design Decisions
//! - Passive data holder: no side effects, no failure modes
//! - Defaults applied once at construction, never re-checked per call
//! - Predicate sees only pre-downstream request parts, so filtering stays
//!   cheap enough for health-check and static-asset exclusion

use axum::http::request::Parts;

/// Predicate deciding whether an exchange should be tracked.
pub type TrackPredicate = dyn Fn(&Parts) -> bool + Send + Sync;

/// Enrichment function producing extra properties for the request record.
pub type Enricher = dyn Fn(&Parts) -> Vec<(String, String)> + Send + Sync;

/// Policy for the tracking middleware.
///
/// Immutable once constructed. Unset fields fall back to defaults:
/// track everything, enrich with nothing.
pub struct TrackingConfig {
    should_track: Box<TrackPredicate>,
    enrich: Box<Enricher>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            should_track: Box::new(|_| true),
            enrich: Box::new(|_| Vec::new()),
        }
    }
}

impl std::fmt::Debug for TrackingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingConfig").finish_non_exhaustive()
    }
}

impl TrackingConfig {
    /// Create a config with the default policy (track everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that skips requests whose path starts with any of the
    /// given prefixes. The common case: excluding `/health` probes and
    /// static assets from tracking.
    pub fn ignoring_path_prefixes<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::new().with_filter(move |parts| {
            !prefixes.iter().any(|p| parts.uri.path().starts_with(p.as_str()))
        })
    }

    /// Replace the tracking predicate.
    pub fn with_filter<F>(mut self, should_track: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.should_track = Box::new(should_track);
        self
    }

    /// Replace the enrichment function.
    pub fn with_enricher<F>(mut self, enrich: F) -> Self
    where
        F: Fn(&Parts) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.enrich = Box::new(enrich);
        self
    }

    /// Evaluate the tracking predicate for one exchange.
    pub fn should_track(&self, parts: &Parts) -> bool {
        (self.should_track)(parts)
    }

    /// Produce the extra properties for one exchange.
    pub fn enrich(&self, parts: &Parts) -> Vec<(String, String)> {
        (self.enrich)(parts)
    }
}
