//! Error types for coordinate reference system operations.

use thiserror::Error;

/// Errors raised by the CRS registry and projection definitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsError {
    /// Reprojection requested to or from an unregistered identifier.
    #[error("unknown CRS '{0}'")]
    UnknownCrs(String),

    /// A projection definition string could not be interpreted.
    #[error("invalid CRS definition for '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },
}
