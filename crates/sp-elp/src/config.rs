//! Codec configuration.

/// Environment variable overriding [`ElpConfig::max_depth`].
pub const MAX_DEPTH_ENV: &str = "SP_ELP_MAX_DEPTH";

/// Limits shared by [`ElpReader`](crate::ElpReader) and [`ElpWriter`](crate::ElpWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElpConfig {
    /// Maximum nesting of classes, methods, lambdas and array constants.
    /// A top-level object or constant sits at depth 1.
    pub max_depth: usize,
}

impl ElpConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Create a config from `SP_ELP_MAX_DEPTH`, falling back to the default.
    pub fn from_env() -> Self {
        let max_depth = std::env::var(MAX_DEPTH_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_MAX_DEPTH);
        Self { max_depth }
    }
}

impl Default for ElpConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH)
    }
}
