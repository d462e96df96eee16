//! Perspective camera and its ground footprint.

use glam::DVec3;

use crate::coord::{scene_to_map, BoundingBox, LocalOrigin};

/// NDC corners, counter-clockwise from top-left.
const NDC_CORNERS: [(f64, f64); 4] = [(-1.0, 1.0), (1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)];

/// Perspective camera in scene space (Y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    /// Unit view direction.
    pub forward: DVec3,
    /// Approximate up vector; re-orthogonalized against `forward`.
    pub up: DVec3,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f64,
    /// Width over height.
    pub aspect: f64,
}

impl Camera {
    /// Camera at `position` looking at `target`.
    ///
    /// A camera looking straight down gets `-Z` (north) as its up vector.
    pub fn look_at(position: DVec3, target: DVec3, fov_y_deg: f64, aspect: f64) -> Self {
        let forward = (target - position).normalize_or_zero();
        let up = if forward.cross(DVec3::Y).length_squared() < 1e-12 {
            DVec3::NEG_Z
        } else {
            DVec3::Y
        };
        Self {
            position,
            forward,
            up,
            fov_y_deg,
            aspect,
        }
    }

    /// Direction of the ray through a point in normalized device
    /// coordinates (`-1..=1` on both axes).
    pub fn ray(&self, ndc_x: f64, ndc_y: f64) -> DVec3 {
        let right = self.forward.cross(self.up).normalize_or_zero();
        let up = right.cross(self.forward);
        let tan = (self.fov_y_deg.to_radians() / 2.0).tan();
        (self.forward + right * (ndc_x * tan * self.aspect) + up * (ndc_y * tan)).normalize_or_zero()
    }

    /// Intersection of a ray with the ground plane `y = 0`, if it hits in
    /// front of the camera.
    pub fn ground_hit(&self, direction: DVec3) -> Option<DVec3> {
        if direction.y.abs() < f64::EPSILON {
            return None;
        }
        let t = -self.position.y / direction.y;
        if !t.is_finite() || t <= 0.0 {
            return None;
        }
        Some(self.position + direction * t)
    }

    /// Map-space bbox visible on the ground plane.
    ///
    /// Casts the four corner rays; returns `None` if any of them misses the
    /// ground (camera looking at the horizon or above).
    pub fn ground_footprint(&self, origin: &LocalOrigin) -> Option<BoundingBox> {
        let mut points = Vec::with_capacity(NDC_CORNERS.len());
        for (x, y) in NDC_CORNERS {
            let hit = self.ground_hit(self.ray(x, y))?;
            let (mx, my, _) = scene_to_map(hit, origin);
            points.push((mx, my));
        }
        BoundingBox::from_points(points)
    }

    /// Map-plane position of the camera, ignoring height.
    pub fn map_position(&self, origin: &LocalOrigin) -> (f64, f64) {
        let (x, y, _) = scene_to_map(self.position, origin);
        (x, y)
    }
}
