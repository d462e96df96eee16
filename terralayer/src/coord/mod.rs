//! Coordinate conversion module
//!
//! Provides conversions between map coordinates (target CRS units, `x`
//! easting / `y` northing / `z` elevation) and scene coordinates used by the
//! 3D scene graph.
//!
//! # Axis convention
//!
//! The scene is Y-up and right-handed:
//!
//! ```text
//! scene.x =   map.x - origin.x
//! scene.y =   map.z - origin.z
//! scene.z = -(map.y - origin.y)
//! ```
//!
//! Northing therefore runs along `-Z`, so ground planes seen from above keep
//! their map orientation. Every loader in this crate goes through these two
//! functions; no other module maps axes on its own.

mod types;

pub use types::{BoundingBox, CoordError, LocalOrigin};

use glam::DVec3;

/// Converts a map coordinate to a scene position relative to `origin`.
#[inline]
pub fn map_to_scene(x: f64, y: f64, z: f64, origin: &LocalOrigin) -> DVec3 {
    DVec3::new(x - origin.x, z - origin.z, -(y - origin.y))
}

/// Converts a scene position back to map coordinates `(x, y, z)`.
#[inline]
pub fn scene_to_map(position: DVec3, origin: &LocalOrigin) -> (f64, f64, f64) {
    (
        position.x + origin.x,
        -position.z + origin.y,
        position.y + origin.z,
    )
}
