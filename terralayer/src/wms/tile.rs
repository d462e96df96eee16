//! Tile keys and the per-layer tile cache entries.

use std::fmt;

use crate::coord::BoundingBox;
use crate::scene::NodeId;

/// Identifies one image of a raster layer.
///
/// Grid keys are derived from the integer cell and the tile size, so the
/// same cell always maps to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileKey {
    /// The one image of a single-image layer.
    Single,
    /// A fixed-grid cell. `size_mm` is the tile size in thousandths of a
    /// target CRS unit.
    Grid { size_mm: u64, col: i64, row: i64 },
}

impl TileKey {
    /// Key of grid cell `(col, row)` for tiles of `tile_size` units.
    pub fn grid(tile_size: f64, col: i64, row: i64) -> Self {
        TileKey::Grid {
            size_mm: (tile_size * 1000.0).round().max(0.0) as u64,
            col,
            row,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileKey::Single => write!(f, "single"),
            TileKey::Grid { size_mm, col, row } => write!(f, "{}mm/{}/{}", size_mm, col, row),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Request in flight; no new request may be issued for this key.
    Loading,
    Loaded,
    /// Last request failed; the next viewport change may retry.
    Error,
}

/// Cache entry for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct TileEntry {
    /// Extent in target CRS units.
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub status: TileStatus,
    /// Mesh currently shown for this key, owned by the layer.
    pub mesh: Option<NodeId>,
}

impl TileEntry {
    pub fn loading(bbox: BoundingBox, width: u32, height: u32) -> Self {
        Self {
            bbox,
            width,
            height,
            status: TileStatus::Loading,
            mesh: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == TileStatus::Loading
    }
}

/// Grid cell containing `(x, y)`.
pub fn grid_cell(x: f64, y: f64, tile_size: f64) -> (i64, i64) {
    ((x / tile_size).floor() as i64, (y / tile_size).floor() as i64)
}

/// Extent of grid cell `(col, row)`: `[i·s, j·s, (i+1)·s, (j+1)·s]`.
pub fn grid_bbox(col: i64, row: i64, tile_size: f64) -> BoundingBox {
    let (i, j) = (col as f64, row as f64);
    BoundingBox::new(
        i * tile_size,
        j * tile_size,
        (i + 1.0) * tile_size,
        (j + 1.0) * tile_size,
    )
}

/// Cells of the square neighborhood of `radius` around `center`, row by
/// row from the south-west corner.
pub fn neighborhood(center: (i64, i64), radius: u32) -> impl Iterator<Item = (i64, i64)> {
    let r = i64::from(radius);
    let (cc, cr) = center;
    (cr - r..=cr + r).flat_map(move |row| (cc - r..=cc + r).map(move |col| (col, row)))
}

/// Chebyshev distance between two cells.
pub fn cell_distance(a: (i64, i64), b: (i64, i64)) -> u64 {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_grid_bbox() {
        assert_eq!(grid_bbox(2, 3, 500.0), BoundingBox::new(1000.0, 1500.0, 1500.0, 2000.0));
        assert_eq!(grid_bbox(-1, -1, 500.0), BoundingBox::new(-500.0, -500.0, 0.0, 0.0));
    }

    #[test]
    fn test_grid_cell_floors_negative() {
        assert_eq!(grid_cell(-0.5, 499.9, 500.0), (-1, 0));
        assert_eq!(grid_cell(420878.0, 4582247.0, 500.0), (841, 9164));
    }

    #[test]
    fn test_neighborhood() {
        let cells: Vec<_> = neighborhood((0, 0), 1).collect();
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0], (-1, -1));
        assert_eq!(cells[8], (1, 1));
        assert_eq!(neighborhood((5, 5), 0).collect::<Vec<_>>(), vec![(5, 5)]);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(TileKey::grid(500.0, 3, -2).to_string(), "500000mm/3/-2");
        assert_eq!(TileKey::Single.to_string(), "single");
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic(col in -10_000i64..10_000, row in -10_000i64..10_000, size in 1.0f64..5000.0) {
            prop_assert_eq!(TileKey::grid(size, col, row), TileKey::grid(size, col, row));

            let bbox = grid_bbox(col, row, size);
            prop_assert!(bbox.min_x <= bbox.max_x && bbox.min_y <= bbox.max_y);

            let (cx, cy) = bbox.center();
            prop_assert_eq!(grid_cell(cx, cy, size), (col, row));
        }
    }
}
