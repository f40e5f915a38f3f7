//! Error types for schema resolution and regeneration

use thiserror::Error;

/// Result type for regeneration operations
pub type Result<T> = std::result::Result<T, RegenError>;

/// Regeneration errors
///
/// Only conditions that invalidate a whole run are raised through this type.
/// Per-schema problems are batched into [`crate::graph::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum RegenError {
    #[error("Unresolved reference: {target}")]
    UnresolvedReference { target: String },

    #[error("Schema registry is empty")]
    EmptyRegistry,

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Build state is malformed: {0}")]
    BuildStateParse(#[source] serde_json::Error),

    #[error("Renderer failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl RegenError {
    pub fn unresolved(target: impl Into<String>) -> Self {
        Self::UnresolvedReference { target: target.into() }
    }

    /// Whether the run can continue after this error by skipping the offending schema
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnresolvedReference { .. } | Self::BuildStateParse(_))
    }
}
