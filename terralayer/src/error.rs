//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::coord::CoordError;
use crate::crs::CrsError;
use crate::geometry::GeometryError;
use crate::gml::GmlError;
use crate::http::HttpError;
use crate::logging::LoggingError;
use crate::wms::WmsError;

/// Any failure of an import, for callers that do not care which stage
/// failed.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Gml(#[from] GmlError),

    #[error(transparent)]
    Wms(#[from] WmsError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl ImportError {
    /// Whether the failure came from the network rather than the input.
    pub fn is_network(&self) -> bool {
        match self {
            ImportError::Http(_) => true,
            ImportError::Gml(GmlError::Http(_)) => true,
            ImportError::Wms(e) => matches!(e, WmsError::Http(_)),
            _ => false,
        }
    }
}

/// Result alias for [`ImportError`].
pub type Result<T> = std::result::Result<T, ImportError>;
