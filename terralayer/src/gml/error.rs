//! Error types for GML loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::crs::CrsError;
use crate::http::HttpError;

/// Document-level GML failures.
///
/// Any of these aborts the whole document. Per-feature geometry problems
/// are not errors; they are counted in the load report.
#[derive(Debug, Error)]
pub enum GmlError {
    /// Empty input or XML that does not parse.
    #[error("malformed GML document: {0}")]
    MalformedDocument(String),

    /// No feature member, or no geometry field, could be found.
    #[error("could not detect feature schema: {0}")]
    SchemaDetection(String),

    /// The document declares no `srsName` and no default SRS is configured.
    #[error("no srsName in document and no default SRS configured")]
    MissingSrs,

    /// The SRS is not registered, or reprojection could not be set up.
    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Fetching the document failed.
    #[error(transparent)]
    Http(#[from] HttpError),
}
