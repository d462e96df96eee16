//! Parsed vector features.

use std::collections::BTreeMap;

use glam::DVec3;

use crate::coord::BoundingBox;

/// Outer ring and holes of one polygon, as raw positions.
///
/// Rings may still carry their closing point; ring construction removes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonCoords {
    pub exterior: Vec<DVec3>,
    pub interiors: Vec<Vec<DVec3>>,
}

/// Feature geometry. Positions are `(x, y, z)` with `z = 0` for 2D input.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(DVec3),
    MultiPoint(Vec<DVec3>),
    LineString(Vec<DVec3>),
    MultiLineString(Vec<Vec<DVec3>>),
    Polygon(PolygonCoords),
    MultiPolygon(Vec<PolygonCoords>),
}

impl FeatureGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureGeometry::Point(_) => "Point",
            FeatureGeometry::MultiPoint(_) => "MultiPoint",
            FeatureGeometry::LineString(_) => "LineString",
            FeatureGeometry::MultiLineString(_) => "MultiLineString",
            FeatureGeometry::Polygon(_) => "Polygon",
            FeatureGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Applies `f` to every position in place.
    pub fn map_positions<F>(&mut self, mut f: F)
    where
        F: FnMut(DVec3) -> DVec3,
    {
        match self {
            FeatureGeometry::Point(p) => *p = f(*p),
            FeatureGeometry::MultiPoint(points) | FeatureGeometry::LineString(points) => {
                apply_all(points, &mut f)
            }
            FeatureGeometry::MultiLineString(lines) => {
                for line in lines {
                    apply_all(line, &mut f);
                }
            }
            FeatureGeometry::Polygon(polygon) => apply_polygon(polygon, &mut f),
            FeatureGeometry::MultiPolygon(polygons) => {
                for polygon in polygons {
                    apply_polygon(polygon, &mut f);
                }
            }
        }
    }

    /// Every position, in document order.
    pub fn positions(&self) -> Vec<DVec3> {
        match self {
            FeatureGeometry::Point(p) => vec![*p],
            FeatureGeometry::MultiPoint(points) | FeatureGeometry::LineString(points) => {
                points.clone()
            }
            FeatureGeometry::MultiLineString(lines) => lines.concat(),
            FeatureGeometry::Polygon(polygon) => polygon_positions(polygon),
            FeatureGeometry::MultiPolygon(polygons) => {
                polygons.iter().flat_map(polygon_positions).collect()
            }
        }
    }

    /// Planar bounds, `None` when the geometry has no positions.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions().into_iter().map(|p| (p.x, p.y)))
    }
}

fn apply_all<F: FnMut(DVec3) -> DVec3>(points: &mut [DVec3], f: &mut F) {
    for p in points.iter_mut() {
        *p = f(*p);
    }
}

fn apply_polygon<F: FnMut(DVec3) -> DVec3>(polygon: &mut PolygonCoords, f: &mut F) {
    apply_all(&mut polygon.exterior, f);
    for ring in &mut polygon.interiors {
        apply_all(ring, f);
    }
}

fn polygon_positions(polygon: &PolygonCoords) -> Vec<DVec3> {
    let mut out = polygon.exterior.clone();
    for ring in &polygon.interiors {
        out.extend_from_slice(ring);
    }
    out
}

/// One parsed feature.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub id: String,
    pub feature_type: String,
    pub geometry: Option<FeatureGeometry>,
    /// Scalar properties; nested elements are flattened as `parent.child`.
    pub properties: BTreeMap<String, String>,
}
