//! Shared error types for the analyzer
//!
//! Analysis itself is total: malformed or unrecognized SSA is absorbed
//! conservatively instead of failing. Errors therefore only arise while
//! constructing a program through the builder or loading configuration.

use thiserror::Error;

use crate::ssa::{BlockId, FuncId, ValueId};

/// Main error type for chainguard operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A builder was asked to reference an entity that does not exist
    #[error("Unknown {entity} in function {func:?}")]
    UnknownEntity { entity: String, func: FuncId },

    /// Phi edge list does not match the block's predecessor list
    #[error("Phi {value:?} in block {block:?} has {edges} edges for {preds} predecessors")]
    PhiArity {
        value: ValueId,
        block: BlockId,
        edges: usize,
        preds: usize,
    },

    /// Malformed SSA construction
    #[error("Invalid SSA: {0}")]
    InvalidSsa(String),

    /// Analysis was cancelled by the caller
    #[error("Analysis cancelled")]
    Cancelled,

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// TOML configuration errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_ssa(message: impl Into<String>) -> Self {
        Self::InvalidSsa(message.into())
    }

    pub fn unknown_entity(entity: impl Into<String>, func: FuncId) -> Self {
        Self::UnknownEntity {
            entity: entity.into(),
            func,
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Replace the error with a configuration error carrying context
    fn config_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn config_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Configuration(format!("{}: {}", context.into(), e)))
    }
}
