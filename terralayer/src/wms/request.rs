//! GetMap request construction.

use reqwest::Url;

use super::params::{is_lat_lon_order, WmsSource};
use crate::coord::BoundingBox;

/// Parameters computed per request; never copied from the base URL.
const POSITIONAL_PARAMS: &[&str] = &["BBOX", "WIDTH", "HEIGHT", "CRS", "SRS", "TRANSPARENT"];

/// Smallest image side requested, in pixels.
pub const DEFAULT_MIN_TILE_PX: u32 = 64;

/// Largest image side requested, in pixels.
pub const DEFAULT_MAX_TILE_PX: u32 = 2048;

/// A fully parameterized GetMap request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    /// Requested extent, in `crs` units, as `minX,minY,maxX,maxY`.
    pub bbox: BoundingBox,
    pub crs: String,
    pub width: u32,
    pub height: u32,
}

impl GetMapRequest {
    /// Builds the request URL from the source's base parameters.
    ///
    /// Every non-positional base parameter is kept in order. `SERVICE`,
    /// `REQUEST` and `FORMAT` are added when the base URL lacks them; a blank
    /// `FORMAT` is replaced by the default.
    pub fn to_url(&self, source: &WmsSource) -> Url {
        let mut url = source.base_url().clone();
        {
            let mut query = url.query_pairs_mut();
            let has = |key: &str| source.get(key).is_some();
            if !has("SERVICE") {
                query.append_pair("SERVICE", "WMS");
            }
            if !has("REQUEST") {
                query.append_pair("REQUEST", "GetMap");
            }
            let has_format = source.get("FORMAT").is_some_and(|f| !f.trim().is_empty());
            if !has_format {
                query.append_pair("FORMAT", source.format());
            }
            for (key, value) in source.params() {
                if key == "FORMAT" && !has_format {
                    continue;
                }
                if !POSITIONAL_PARAMS.contains(&key.as_str()) {
                    query.append_pair(key, value);
                }
            }

            let bbox = if is_lat_lon_order(source.version(), &self.crs) {
                self.bbox.swapped_axes()
            } else {
                self.bbox
            };
            query.append_pair("BBOX", &bbox.to_string());
            query.append_pair("WIDTH", &self.width.to_string());
            query.append_pair("HEIGHT", &self.height.to_string());
            let crs_key = if source.uses_crs_param() { "CRS" } else { "SRS" };
            query.append_pair(crs_key, &self.crs);
            if source.is_transparent_format() {
                query.append_pair("TRANSPARENT", "true");
            }
        }
        url
    }
}

/// Pixel size for an extent: `round(extent * pixels_per_unit)` clamped to
/// `[min_px, max_px]`.
pub fn pixel_size(extent: f64, pixels_per_unit: f64, min_px: u32, max_px: u32) -> u32 {
    let px = (extent * pixels_per_unit).round();
    if !px.is_finite() || px <= f64::from(min_px) {
        return min_px;
    }
    if px >= f64::from(max_px) {
        return max_px;
    }
    px as u32
}
