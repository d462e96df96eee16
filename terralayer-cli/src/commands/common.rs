//! Common types and utilities shared across CLI commands.

use std::sync::Arc;

use console::style;
use terralayer::config::ConfigFile;
use terralayer::coord::LocalOrigin;
use terralayer::crs::CrsRegistry;
use terralayer::http::{AsyncReqwestClient, Credentials};

use crate::error::CliError;

/// Parses an `x,y[,z]` argument.
pub fn parse_point(s: &str) -> Result<LocalOrigin, String> {
    s.parse::<LocalOrigin>().map_err(|e| e.to_string())
}

/// Whether a source argument names a remote document.
pub fn is_url(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Basic-auth credentials from `--user`/`--password`.
pub fn credentials(
    user: Option<String>,
    password: Option<String>,
) -> Result<Option<Credentials>, CliError> {
    match (user, password) {
        (Some(user), password) => Ok(Some(Credentials::new(user, password.unwrap_or_default()))),
        (None, Some(_)) => Err(CliError::InvalidArgument(
            "--password requires --user".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

/// CRS registry with the configured `[crs]` entries.
pub fn registry(config: &ConfigFile) -> Result<Arc<CrsRegistry>, CliError> {
    Ok(Arc::new(config.crs_registry()?))
}

/// HTTP client using the configured timeout.
pub fn http_client(config: &ConfigFile) -> Result<AsyncReqwestClient, CliError> {
    Ok(AsyncReqwestClient::with_timeout(config.wms.timeout)?)
}

/// Prints a section heading.
pub fn heading(title: &str) {
    println!("{}", style(title).bold().cyan());
}

/// Prints an aligned `label: value` line.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", style(format!("{}:", label)).dim(), value);
}

/// Prints a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1,2").unwrap(), LocalOrigin::new(1.0, 2.0, 0.0));
        assert_eq!(parse_point("1,2,3").unwrap(), LocalOrigin::new(1.0, 2.0, 3.0));
        assert!(parse_point("1").is_err());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://host/wfs?typeName=a"));
        assert!(is_url("HTTP://host"));
        assert!(!is_url("./parcels.gml"));
    }

    #[test]
    fn test_credentials() {
        assert_eq!(credentials(None, None).unwrap(), None);
        let creds = credentials(Some("user".into()), Some("pw".into())).unwrap().unwrap();
        assert_eq!(creds.username, "user");
        assert!(credentials(None, Some("pw".into())).is_err());
    }
}
