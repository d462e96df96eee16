//! Error types for ring and solid construction.

use thiserror::Error;

/// Failures while turning coordinates into solids.
///
/// These are always recovered per feature: the feature is skipped and the
/// rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The outer ring has fewer than three distinct points.
    #[error("degenerate ring: {points} usable points, need at least 3")]
    Degenerate { points: usize },

    /// The extrusion height is negative or not finite.
    #[error("invalid extrusion height {0}")]
    InvalidHeight(f64),
}
