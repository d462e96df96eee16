//! Core coordinate types: bounding boxes and the local scene origin.

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building or parsing coordinate values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// A bbox string did not contain four comma-separated numbers.
    #[error("invalid bbox '{0}': expected minX,minY,maxX,maxY")]
    InvalidBbox(String),

    /// A coordinate triple string could not be parsed.
    #[error("invalid coordinate '{0}': expected x,y[,z]")]
    InvalidPoint(String),

    /// A value was NaN or infinite.
    #[error("non-finite coordinate value")]
    NonFinite,
}

/// Axis-aligned bounding box in some CRS, as `minX,minY,maxX,maxY`.
///
/// The constructor does not reorder its arguments; use [`BoundingBox::from_corners`]
/// when the corner order is not known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a bbox from its four edges.
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bbox from two arbitrary corners, normalizing min/max per axis.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
    }

    /// Create a bbox of the given size centered on `(cx, cy)`.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Smallest bbox containing all points, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox.expand_to(x, y);
        }
        Some(bbox)
    }

    /// Grow the bbox so it contains `(x, y)`.
    pub fn expand_to(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// A bbox with zero or negative extent on either axis covers no area.
    pub fn is_degenerate(&self) -> bool {
        !(self.min_x < self.max_x && self.min_y < self.max_y)
    }

    /// Overlap of two boxes, or `None` when the overlap has no area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let clipped = BoundingBox::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if clipped.is_degenerate() {
            None
        } else {
            Some(clipped)
        }
    }

    /// Check whether `(x, y)` lies inside or on the edge of the bbox.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// The same box with the axes swapped (used for lat/lon axis order).
    pub fn swapped_axes(&self) -> BoundingBox {
        BoundingBox::new(self.min_y, self.min_x, self.max_y, self.max_x)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl FromStr for BoundingBox {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CoordError::InvalidBbox(s.to_string()))?;

        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => {
                if parts.iter().any(|v| !v.is_finite()) {
                    return Err(CoordError::NonFinite);
                }
                Ok(BoundingBox::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => Err(CoordError::InvalidBbox(s.to_string())),
        }
    }
}

/// Offset subtracted from every reprojected coordinate before it enters the
/// scene, keeping floating-point magnitudes small.
///
/// Components are expressed in target CRS units: `x` easting, `y` northing,
/// `z` elevation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LocalOrigin {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LocalOrigin {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Origin at the center of a bbox, at zero elevation.
    pub fn from_bbox_center(bbox: &BoundingBox) -> Self {
        let (x, y) = bbox.center();
        Self::new(x, y, 0.0)
    }

    /// Map-plane coordinates relative to this origin.
    pub fn local_xy(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.x, y - self.y)
    }

    pub fn as_dvec3(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

impl FromStr for LocalOrigin {
    type Err = CoordError;

    /// Parses `x,y` or `x,y,z`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CoordError::InvalidPoint(s.to_string()))?;

        let origin = match parts.as_slice() {
            [x, y] => LocalOrigin::new(*x, *y, 0.0),
            [x, y, z] => LocalOrigin::new(*x, *y, *z),
            _ => return Err(CoordError::InvalidPoint(s.to_string())),
        };
        if parts.iter().any(|v| !v.is_finite()) {
            return Err(CoordError::NonFinite);
        }
        Ok(origin)
    }
}
