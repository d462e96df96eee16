//! Closed 2D rings relative to a local origin.

use glam::DVec2;

use crate::coord::{BoundingBox, LocalOrigin};

/// Orientation of a ring in the map plane (x east, y north).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    CounterClockwise,
    Clockwise,
    /// Zero signed area.
    Degenerate,
}

/// A closed ring stored without its closing point.
///
/// The first point is never repeated at the end; a valid ring has at least
/// three points. An empty ring marks a rejected input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ring {
    points: Vec<DVec2>,
}

impl Ring {
    /// A rejected ring.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn into_points(self) -> Vec<DVec2> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace area; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x * b.y - b.x * a.y;
        }
        twice / 2.0
    }

    pub fn winding(&self) -> Winding {
        let area = self.signed_area();
        if area > 0.0 {
            Winding::CounterClockwise
        } else if area < 0.0 {
            Winding::Clockwise
        } else {
            Winding::Degenerate
        }
    }

    /// Reverses point order when the ring runs the other way.
    pub fn with_winding(mut self, winding: Winding) -> Self {
        let current = self.winding();
        if current != Winding::Degenerate && winding != Winding::Degenerate && current != winding {
            self.points.reverse();
        }
        self
    }

    /// Bounds in local coordinates, `None` for an empty ring.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter().map(|p| (p.x, p.y)))
    }
}

/// Builds a ring from map coordinate pairs.
///
/// The origin is subtracted from every pair and trailing points equal to
/// the first are dropped. Fewer than three remaining points, or any
/// non-finite coordinate, yields an empty ring.
pub fn to_ring<I>(pairs: I, origin: &LocalOrigin) -> Ring
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut points = Vec::new();
    for (x, y) in pairs {
        if !x.is_finite() || !y.is_finite() {
            return Ring::empty();
        }
        let (lx, ly) = origin.local_xy(x, y);
        points.push(DVec2::new(lx, ly));
    }

    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return Ring::empty();
    }
    Ring { points }
}
