//! CRS definitions and proj4 string parsing.

use std::collections::HashMap;
use std::fmt;

use super::ellipsoid::Ellipsoid;
use super::error::CrsError;
use super::projection::{Projection, TransverseMercator};

/// An immutable coordinate reference system definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    /// Normalised identifier, e.g. `EPSG:25831`.
    pub id: String,
    /// Human readable name.
    pub name: String,
    pub projection: Projection,
}

impl CrsDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, projection: Projection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            projection,
        }
    }

    /// Geographic longitude/latitude.
    pub fn geographic(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Projection::Geographic)
    }

    /// UTM zone definition.
    pub fn utm(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: u8,
        north: bool,
        ellipsoid: Ellipsoid,
    ) -> Self {
        Self::new(
            id,
            name,
            Projection::TransverseMercator(TransverseMercator::utm(zone, north, ellipsoid)),
        )
    }

    /// Spherical Web Mercator (EPSG:3857).
    pub fn web_mercator(id: impl Into<String>) -> Self {
        Self::new(
            id,
            "WGS 84 / Pseudo-Mercator",
            Projection::WebMercator {
                radius: Ellipsoid::WGS84.a,
            },
        )
    }

    /// Whether coordinates are longitude/latitude degrees.
    pub fn is_geographic(&self) -> bool {
        self.projection.is_geographic()
    }

    /// Converts native coordinates to geographic `(lon, lat)`.
    #[inline]
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        self.projection.inverse(x, y)
    }

    /// Converts geographic `(lon, lat)` to native coordinates.
    #[inline]
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.projection.forward(lon, lat)
    }

    /// Parses a proj4-style definition.
    ///
    /// Supported: `+proj=longlat|latlong`, `+proj=utm +zone= [+south]`,
    /// `+proj=tmerc +lat_0 +lon_0 +k|+k_0 +x_0 +y_0`, and `+proj=merc` on a
    /// sphere given by `+a`/`+b` or `+R`. The ellipsoid comes from `+ellps=`,
    /// `+datum=WGS84`, or `+a`/`+b`/`+rf`; it defaults to WGS84.
    pub fn from_proj4(id: &str, definition: &str) -> Result<Self, CrsError> {
        let params = Proj4Params::parse(definition);
        let invalid = |reason: String| CrsError::InvalidDefinition {
            id: id.to_string(),
            reason,
        };

        let proj = params
            .get("proj")
            .ok_or_else(|| invalid("missing +proj".to_string()))?;

        if let Some(units) = params.get("units") {
            if units != "m" && proj != "longlat" && proj != "latlong" {
                return Err(invalid(format!("unsupported units '{}'", units)));
            }
        }

        let ellipsoid = params.ellipsoid().map_err(&invalid)?;

        let projection = match proj {
            "longlat" | "latlong" => Projection::Geographic,
            "utm" => {
                let zone: u8 = params
                    .number("zone")
                    .map_err(&invalid)?
                    .ok_or_else(|| invalid("utm requires +zone".to_string()))?
                    as u8;
                if !(1..=60).contains(&zone) {
                    return Err(invalid(format!("utm zone {} out of range", zone)));
                }
                Projection::TransverseMercator(TransverseMercator::utm(
                    zone,
                    !params.flag("south"),
                    ellipsoid,
                ))
            }
            "tmerc" => {
                let k_0 = match params.number("k_0").map_err(&invalid)? {
                    Some(k) => k,
                    None => params.number("k").map_err(&invalid)?.unwrap_or(1.0),
                };
                Projection::TransverseMercator(TransverseMercator {
                    ellipsoid,
                    lon_0: params.number("lon_0").map_err(&invalid)?.unwrap_or(0.0),
                    lat_0: params.number("lat_0").map_err(&invalid)?.unwrap_or(0.0),
                    k_0,
                    false_easting: params.number("x_0").map_err(&invalid)?.unwrap_or(0.0),
                    false_northing: params.number("y_0").map_err(&invalid)?.unwrap_or(0.0),
                })
            }
            "merc" => {
                let radius = match params.number("R").map_err(&invalid)? {
                    Some(r) => r,
                    None if ellipsoid.f == 0.0 => ellipsoid.a,
                    None => {
                        return Err(invalid(
                            "only spherical mercator (+a = +b or +R) is supported".to_string(),
                        ))
                    }
                };
                Projection::WebMercator { radius }
            }
            other => return Err(invalid(format!("unsupported projection '{}'", other))),
        };

        Ok(Self::new(id, definition.trim(), projection))
    }
}

impl fmt::Display for CrsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

/// Tokenised `+key=value` parameters.
struct Proj4Params {
    values: HashMap<String, Option<String>>,
}

impl Proj4Params {
    fn parse(definition: &str) -> Self {
        let values = definition
            .split_whitespace()
            .filter_map(|token| token.strip_prefix('+'))
            .map(|token| match token.split_once('=') {
                Some((k, v)) => (k.to_string(), Some(v.to_string())),
                None => (token.to_string(), None),
            })
            .collect();
        Self { values }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    fn flag(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn number(&self, key: &str) -> Result<Option<f64>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("+{} is not a number: '{}'", key, raw)),
        }
    }

    fn ellipsoid(&self) -> Result<Ellipsoid, String> {
        if let Some(name) = self.get("ellps") {
            return Ellipsoid::from_proj_name(name)
                .ok_or_else(|| format!("unknown ellipsoid '{}'", name));
        }
        if let Some(a) = self.number("a")? {
            if let Some(b) = self.number("b")? {
                return Ok(Ellipsoid::from_axes(a, b));
            }
            if let Some(rf) = self.number("rf")? {
                return Ok(Ellipsoid::new(a, 1.0 / rf));
            }
            return Ok(Ellipsoid::sphere(a));
        }
        if let Some(radius) = self.number("R")? {
            return Ok(Ellipsoid::sphere(radius));
        }
        match self.get("datum") {
            None => Ok(Ellipsoid::WGS84),
            Some(d) if d.eq_ignore_ascii_case("wgs84") => Ok(Ellipsoid::WGS84),
            Some(d) => Err(format!("unknown datum '{}'", d)),
        }
    }
}
