//! Registry of named coordinate reference systems.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::definition::CrsDefinition;
use super::ellipsoid::Ellipsoid;
use super::error::CrsError;
use super::normalize::normalize_srs;
use crate::coord::BoundingBox;

/// UTM zones covered by the default registry (Europe and Africa).
const DEFAULT_UTM_ZONES: std::ops::RangeInclusive<u8> = 28..=38;

/// Named CRS definitions and the transforms between them.
///
/// Definitions are immutable once registered. The registry is built once at
/// start-up and then shared read-only by the loaders and the raster
/// streamer.
#[derive(Debug, Clone, Default)]
pub struct CrsRegistry {
    definitions: HashMap<String, Arc<CrsDefinition>>,
}

impl CrsRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the geographic, Web Mercator and
    /// European UTM systems.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(CrsDefinition::geographic("EPSG:4326", "WGS 84"));
        registry.register(CrsDefinition::geographic("EPSG:4258", "ETRS89"));
        registry.register(CrsDefinition::web_mercator("EPSG:3857"));

        for zone in DEFAULT_UTM_ZONES {
            registry.register(CrsDefinition::utm(
                format!("EPSG:{}", 25800 + u32::from(zone)),
                format!("ETRS89 / UTM zone {}N", zone),
                zone,
                true,
                Ellipsoid::GRS80,
            ));
            registry.register(CrsDefinition::utm(
                format!("EPSG:{}", 32600 + u32::from(zone)),
                format!("WGS 84 / UTM zone {}N", zone),
                zone,
                true,
                Ellipsoid::WGS84,
            ));
            registry.register(CrsDefinition::utm(
                format!("EPSG:{}", 32700 + u32::from(zone)),
                format!("WGS 84 / UTM zone {}S", zone),
                zone,
                false,
                Ellipsoid::WGS84,
            ));
        }

        debug!(count = registry.len(), "Default CRS registry built");
        registry
    }

    /// Registers a definition under its (normalised) identifier.
    ///
    /// Returns `false` and leaves the existing definition in place when the
    /// identifier is already known.
    pub fn register(&mut self, mut definition: CrsDefinition) -> bool {
        let id = normalize_srs(&definition.id);
        if let Some(existing) = self.definitions.get(&id) {
            if existing.projection == definition.projection {
                debug!(crs = %id, "CRS already registered");
            } else {
                warn!(crs = %id, "CRS already registered with a different definition, keeping the first");
            }
            return false;
        }
        definition.id = id.clone();
        self.definitions.insert(id, Arc::new(definition));
        true
    }

    /// Parses and registers a proj4 definition.
    pub fn register_proj4(&mut self, id: &str, proj4: &str) -> Result<bool, CrsError> {
        let definition = CrsDefinition::from_proj4(&normalize_srs(id), proj4)?;
        let added = self.register(definition);
        if added {
            info!(crs = %normalize_srs(id), "Registered CRS from proj4 definition");
        }
        Ok(added)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(&normalize_srs(id))
    }

    pub fn get(&self, id: &str) -> Option<Arc<CrsDefinition>> {
        self.definitions.get(&normalize_srs(id)).cloned()
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.definitions.keys().cloned().collect();
        ids.sort_by_key(|id| sort_key(id));
        ids
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Builds the transform from `source` to `target`.
    ///
    /// # Errors
    ///
    /// `CrsError::UnknownCrs` if either identifier is not registered.
    pub fn transform(&self, source: &str, target: &str) -> Result<Transform, CrsError> {
        let source_def = self
            .get(source)
            .ok_or_else(|| CrsError::UnknownCrs(source.to_string()))?;
        let target_def = self
            .get(target)
            .ok_or_else(|| CrsError::UnknownCrs(target.to_string()))?;

        if source_def.id == target_def.id {
            return Ok(Transform::identity(source_def));
        }
        Ok(Transform {
            source: source_def,
            target: target_def,
            identity: false,
        })
    }
}

fn sort_key(id: &str) -> (String, u64) {
    match id.split_once(':') {
        Some((authority, code)) => (authority.to_string(), code.parse().unwrap_or(u64::MAX)),
        None => (id.to_string(), 0),
    }
}

/// Transform between two registered systems.
#[derive(Debug, Clone)]
pub struct Transform {
    source: Arc<CrsDefinition>,
    target: Arc<CrsDefinition>,
    identity: bool,
}

impl Transform {
    fn identity(definition: Arc<CrsDefinition>) -> Self {
        Self {
            source: Arc::clone(&definition),
            target: definition,
            identity: true,
        }
    }

    pub fn source(&self) -> &CrsDefinition {
        &self.source
    }

    pub fn target(&self) -> &CrsDefinition {
        &self.target
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transforms one coordinate pair.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        if self.identity {
            return (x, y);
        }
        let (lon, lat) = self.source.to_geographic(x, y);
        self.target.from_geographic(lon, lat)
    }

    /// Transforms a bounding box.
    ///
    /// The result envelopes the transformed corners and edge midpoints,
    /// since straight edges do not stay straight under reprojection.
    pub fn apply_bbox(&self, bbox: &BoundingBox) -> BoundingBox {
        if self.identity {
            return *bbox;
        }
        let (cx, cy) = bbox.center();
        let samples = [
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
            (cx, bbox.min_y),
            (bbox.max_x, cy),
            (cx, bbox.max_y),
            (bbox.min_x, cy),
        ];
        let points = samples.iter().map(|&(x, y)| self.apply(x, y));
        BoundingBox::from_points(points).unwrap_or(*bbox)
    }

    /// The reverse transform.
    pub fn inverse(&self) -> Transform {
        Transform {
            source: Arc::clone(&self.target),
            target: Arc::clone(&self.source),
            identity: self.identity,
        }
    }
}
