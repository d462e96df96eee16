//! Polygon profiles and the extrusion handoff.

use tracing::debug;

use super::error::GeometryError;
use super::ring::{Ring, Winding};
use crate::scene::{Geometry, Material, Mesh, SceneNode};

/// Outer boundary plus interior cutouts, in local map-plane coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Counter-clockwise boundary.
    pub outer: Ring,
    /// Clockwise cutouts.
    pub holes: Vec<Ring>,
}

/// A profile marked for extrusion.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidDescriptor {
    pub profile: Profile,
    /// Elevation of the bottom face, relative to the origin.
    pub base_elevation: f64,
    pub extrusion_height: f64,
}

impl SolidDescriptor {
    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }
}

/// Builds an extrusion descriptor from an outer ring and its holes.
///
/// An outer ring with fewer than three points or zero area is rejected;
/// such holes are dropped. Windings are normalised to a counter-clockwise
/// boundary and clockwise holes.
pub fn build_polygon(
    outer: Ring,
    holes: Vec<Ring>,
    extrusion_height: f64,
) -> Result<SolidDescriptor, GeometryError> {
    if !has_area(&outer) {
        return Err(GeometryError::Degenerate {
            points: outer.len(),
        });
    }
    if !extrusion_height.is_finite() || extrusion_height < 0.0 {
        return Err(GeometryError::InvalidHeight(extrusion_height));
    }

    let total = holes.len();
    let holes: Vec<Ring> = holes
        .into_iter()
        .filter(has_area)
        .map(|h| h.with_winding(Winding::Clockwise))
        .collect();
    if holes.len() < total {
        debug!(
            dropped = total - holes.len(),
            kept = holes.len(),
            "Dropped degenerate hole rings"
        );
    }

    Ok(SolidDescriptor {
        profile: Profile {
            outer: outer.with_winding(Winding::CounterClockwise),
            holes,
        },
        base_elevation: 0.0,
        extrusion_height,
    })
}

fn has_area(ring: &Ring) -> bool {
    ring.len() >= 3 && ring.winding() != Winding::Degenerate
}

/// Materialises extrusion descriptors as scene nodes.
pub trait SolidBuilder: Send + Sync {
    fn build(&self, name: &str, descriptor: SolidDescriptor) -> Result<SceneNode, GeometryError>;
}

/// Default builder: one mesh per solid carrying the descriptor as its
/// geometry.
#[derive(Debug, Clone)]
pub struct ExtrusionBuilder {
    material: Material,
}

impl ExtrusionBuilder {
    pub fn new(material: Material) -> Self {
        Self { material }
    }
}

impl Default for ExtrusionBuilder {
    fn default() -> Self {
        Self::new(Material::solid([0.8, 0.8, 0.8, 1.0]))
    }
}

impl SolidBuilder for ExtrusionBuilder {
    fn build(&self, name: &str, descriptor: SolidDescriptor) -> Result<SceneNode, GeometryError> {
        let position = glam::DVec3::new(0.0, descriptor.base_elevation, 0.0);
        Ok(SceneNode::Mesh(Mesh::new(
            name,
            Geometry::Extrusion(descriptor),
            self.material.clone(),
            position,
        )))
    }
}
