//! Resolver configuration

use serde::{Deserialize, Serialize};

/// Resolver behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Precompute per-type resolution plans and reuse them across lookups
    pub use_analysis_cache: bool,
    /// Emit a `trace!` event for every field resolution
    pub trace_resolution: bool,
}

impl ResolverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With analysis cache
    #[inline]
    #[must_use]
    pub fn with_analysis_cache(mut self, enabled: bool) -> Self {
        self.use_analysis_cache = enabled;
        self
    }

    /// With per-field resolution tracing
    #[inline]
    #[must_use]
    pub fn with_trace_resolution(mut self, enabled: bool) -> Self {
        self.trace_resolution = enabled;
        self
    }
}
