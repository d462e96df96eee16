//! WMS source descriptors parsed from a GetMap URL.

use reqwest::Url;

use super::error::WmsError;
use crate::coord::BoundingBox;
use crate::crs::normalize_srs;
use crate::http::Credentials;

/// Version assumed when the URL does not declare one.
pub const DEFAULT_WMS_VERSION: &str = "1.1.1";

/// Format assumed when the URL does not declare one.
pub const DEFAULT_FORMAT: &str = "image/png";

/// A WMS endpoint and its base request parameters.
///
/// Parameter keys are upper-cased on parse, so lookups are
/// case-insensitive. Values are kept verbatim and in URL order.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsSource {
    base_url: Url,
    params: Vec<(String, String)>,
    credentials: Option<Credentials>,
}

impl WmsSource {
    /// Parses a WMS URL such as
    /// `https://host/wms?SERVICE=WMS&VERSION=1.3.0&LAYERS=orto&BBOX=...`.
    pub fn parse(url: &str) -> Result<Self, WmsError> {
        let parsed = Url::parse(url.trim()).map_err(|e| WmsError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut params: Vec<(String, String)> = Vec::new();
        for (key, value) in parsed.query_pairs() {
            let key = key.to_ascii_uppercase();
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value.into_owned(),
                None => params.push((key, value.into_owned())),
            }
        }

        let mut base_url = parsed;
        base_url.set_query(None);
        base_url.set_fragment(None);

        Ok(Self {
            base_url,
            params,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets (or replaces) a base parameter.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Endpoint URL without query string.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base parameters as `(UPPERCASE_KEY, value)` pairs.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Case-insensitive parameter lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn version(&self) -> &str {
        self.get("VERSION")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_WMS_VERSION)
    }

    /// WMS 1.3 names the CRS parameter `CRS`; older versions use `SRS`.
    pub fn uses_crs_param(&self) -> bool {
        self.version().starts_with("1.3")
    }

    pub fn format(&self) -> &str {
        self.get("FORMAT")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FORMAT)
    }

    /// Whether the format supports transparency (PNG or GIF).
    pub fn is_transparent_format(&self) -> bool {
        let format = self.format().to_ascii_lowercase();
        format.contains("png") || format.contains("gif")
    }

    pub fn layers(&self) -> Option<&str> {
        self.get("LAYERS")
    }

    /// The CRS declared by the URL (`CRS` or `SRS`), normalised.
    pub fn declared_crs(&self) -> Option<String> {
        self.get("CRS")
            .or_else(|| self.get("SRS"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(normalize_srs)
    }

    /// Boundary box from the URL's `BBOX`, in the declared CRS.
    ///
    /// Returns `Ok(None)` when the URL has no BBOX. The boundary is always
    /// stored as `minX,minY,maxX,maxY`; a WMS 1.3.0 EPSG:4326 BBOX is read
    /// in lat/lon order.
    pub fn boundary(&self) -> Result<Option<BoundingBox>, WmsError> {
        let Some(raw) = self.get("BBOX") else {
            return Ok(None);
        };
        let bbox: BoundingBox = raw
            .parse()
            .map_err(|_| WmsError::InvalidBbox(raw.to_string()))?;
        if bbox.is_degenerate() {
            return Err(WmsError::InvalidBbox(raw.to_string()));
        }
        let lat_lon = self.declared_crs().is_some_and(|crs| is_lat_lon_order(self.version(), &crs));
        Ok(Some(if lat_lon { bbox.swapped_axes() } else { bbox }))
    }
}

/// WMS 1.3.0 orders EPSG:4326 coordinates as latitude, longitude.
pub fn is_lat_lon_order(version: &str, crs: &str) -> bool {
    version.starts_with("1.3") && crs == "EPSG:4326"
}
