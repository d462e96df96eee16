//! SRS identifier normalisation.
//!
//! GML documents and WMS capabilities spell the same EPSG code in several
//! ways. Everything downstream of the parsers works with the plain
//! `EPSG:<code>` form only.

use std::sync::OnceLock;

use regex::Regex;

/// Accepted spellings:
/// - `EPSG:25831`
/// - `urn:ogc:def:crs:EPSG::25831`, `urn:ogc:def:crs:EPSG:6.6:25831`
/// - `urn:x-ogc:def:crs:EPSG:25831`
/// - `http://www.opengis.net/gml/srs/epsg.xml#25831`
/// - `http://www.opengis.net/def/crs/EPSG/0/25831`
fn srs_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:EPSG:(?:[\d.]*:)?:?(\d+)$|epsg\.xml#(\d+)$|/EPSG/[^/]+/(\d+)$)")
            .unwrap()
    })
}

/// Maps any recognised EPSG spelling to `EPSG:<code>`; other input is
/// returned trimmed but otherwise unchanged.
pub fn normalize_srs(srs: &str) -> String {
    let srs = srs.trim();
    match srs_pattern().captures(srs) {
        Some(caps) => {
            let code = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            format!("EPSG:{}", code)
        }
        None => srs.to_string(),
    }
}

/// Whether the identifier uses a URN or http form.
///
/// Those forms declare the authority's axis order, which is latitude first
/// for geographic systems; plain `EPSG:<code>` is read as x/y.
pub fn is_authority_axis_order(srs: &str) -> bool {
    let srs = srs.trim().to_ascii_lowercase();
    srs.starts_with("urn:") || srs.starts_with("http://") || srs.starts_with("https://")
}
