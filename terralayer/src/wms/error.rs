//! Error types for WMS layers.

use thiserror::Error;

use crate::crs::CrsError;
use crate::http::HttpError;

/// WMS import and fetch failures.
///
/// Import-time errors (`InvalidUrl`, `InvalidBbox`, `Crs`) abort the import.
/// Fetch-time errors are recovered per tile: the entry is released and the
/// failure logged.
#[derive(Debug, Clone, Error)]
pub enum WmsError {
    #[error("invalid WMS URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid BBOX parameter '{0}'")]
    InvalidBbox(String),

    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with an OGC service exception document.
    #[error("WMS service exception: {0}")]
    ServiceException(String),

    /// The response body is not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

impl WmsError {
    /// Whether this is a network-class fetch failure (recovered for tiles).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            WmsError::Http(_) | WmsError::ServiceException(_) | WmsError::Decode(_)
        )
    }
}
