//! CLI error type.

use std::fmt;

use terralayer::config::ConfigError;
use terralayer::crs::CrsError;
use terralayer::gml::GmlError;
use terralayer::http::HttpError;
use terralayer::logging::LoggingError;
use terralayer::wms::WmsError;

/// Errors surfaced to the user by a command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be read, written or applied.
    Config(String),

    /// A command-line argument was rejected.
    InvalidArgument(String),

    Crs(CrsError),

    Gml(GmlError),

    Wms(WmsError),

    Http(HttpError),

    Logging(LoggingError),

    /// JSON output could not be produced.
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Crs(e) => write!(f, "CRS error: {}", e),
            CliError::Gml(e) => write!(f, "GML import failed: {}", e),
            CliError::Wms(e) => write!(f, "WMS import failed: {}", e),
            CliError::Http(e) => write!(f, "HTTP error: {}", e),
            CliError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Crs(e) => Some(e),
            CliError::Gml(e) => Some(e),
            CliError::Wms(e) => Some(e),
            CliError::Http(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Config(_) | CliError::InvalidArgument(_) | CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CrsError> for CliError {
    fn from(e: CrsError) -> Self {
        CliError::Crs(e)
    }
}

impl From<GmlError> for CliError {
    fn from(e: GmlError) -> Self {
        CliError::Gml(e)
    }
}

impl From<WmsError> for CliError {
    fn from(e: WmsError) -> Self {
        CliError::Wms(e)
    }
}

impl From<HttpError> for CliError {
    fn from(e: HttpError) -> Self {
        CliError::Http(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CliError::Config("missing key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err: CliError = CrsError::UnknownCrs("EPSG:1".to_string()).into();
        assert_eq!(err.to_string(), "CRS error: unknown CRS 'EPSG:1'");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidArgument("x".into()).exit_code(), 2);
        assert_eq!(CliError::Gml(GmlError::MissingSrs).exit_code(), 1);
    }
}
