//! Raster layer state and its viewport-driven update loop.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::camera::Camera;
use super::change::ChangeThresholds;
use super::dispatch::{FetchCompletion, FetchRequest, ImageDispatcher};
use super::error::WmsError;
use super::params::WmsSource;
use super::request::{pixel_size, GetMapRequest, DEFAULT_MAX_TILE_PX, DEFAULT_MIN_TILE_PX};
use super::tile::{cell_distance, grid_bbox, grid_cell, neighborhood, TileEntry, TileKey, TileStatus};
use crate::coord::{map_to_scene, BoundingBox, LocalOrigin};
use crate::crs::{CrsRegistry, Transform};
use crate::gml::DEFAULT_TARGET_CRS;
use crate::scene::{Geometry, Group, Material, Mesh, NodeId, SceneGraph, SceneNode};

/// Default requested resolution, in pixels per target CRS unit.
pub const DEFAULT_PIXELS_PER_UNIT: f64 = 10.0;

/// Default grid tile size, in target CRS units.
pub const DEFAULT_TILE_SIZE: f64 = 500.0;

/// Default grid tile image size, in pixels.
pub const DEFAULT_TILE_PX: u32 = 256;

/// Default grid neighborhood radius, in tiles.
pub const DEFAULT_VIEW_RADIUS: u32 = 2;

/// Name of the single-image mesh.
const IMAGE_PLANE_NAME: &str = "image_plane";

/// Request strategy of a raster layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// One image covering the visible footprint, re-requested on large
    /// pans and zooms.
    #[default]
    Single,
    /// Fixed-size tiles around the camera, cached per grid cell.
    Grid,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamMode::Single => write!(f, "single"),
            StreamMode::Grid => write!(f, "grid"),
        }
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(StreamMode::Single),
            "grid" => Ok(StreamMode::Grid),
            other => Err(format!("unknown mode '{}': expected single or grid", other)),
        }
    }
}

/// Raster layer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterConfig {
    pub mode: StreamMode,
    pub pixels_per_unit: f64,
    pub thresholds: ChangeThresholds,
    pub min_tile_px: u32,
    pub max_tile_px: u32,
    /// Grid tile size in target CRS units.
    pub tile_size: f64,
    /// Grid tile image size in pixels.
    pub tile_px: u32,
    pub view_radius: u32,
    /// Minimum time between accepted updates; zero disables throttling.
    pub min_update_interval: Duration,
    /// CRS of the scene.
    pub target_crs: String,
    /// CRS of GetMap requests; defaults to the URL's CRS/SRS, then to the
    /// target CRS.
    pub request_crs: Option<String>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            mode: StreamMode::Single,
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            thresholds: ChangeThresholds::default(),
            min_tile_px: DEFAULT_MIN_TILE_PX,
            max_tile_px: DEFAULT_MAX_TILE_PX,
            tile_size: DEFAULT_TILE_SIZE,
            tile_px: DEFAULT_TILE_PX,
            view_radius: DEFAULT_VIEW_RADIUS,
            min_update_interval: Duration::ZERO,
            target_crs: DEFAULT_TARGET_CRS.to_string(),
            request_crs: None,
        }
    }
}

impl RasterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_target_crs(mut self, crs: impl Into<String>) -> Self {
        self.target_crs = crs.into();
        self
    }

    pub fn with_request_crs(mut self, crs: impl Into<String>) -> Self {
        self.request_crs = Some(crs.into());
        self
    }

    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval = interval;
        self
    }
}

/// Result of a viewport update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// This many fetches were dispatched.
    Requested(usize),
    /// The view did not change enough, or every tile is already cached.
    Unchanged,
    /// The single image is still in flight.
    Busy,
    /// Inside the minimum update interval.
    Throttled,
    /// A corner ray missed the ground.
    NoFootprint,
    /// The view does not overlap the layer boundary.
    OutOfBounds,
    /// The layer is not attached.
    Inactive,
}

/// Result of applying a fetch completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionOutcome {
    /// A new mesh was attached.
    Attached(NodeId),
    /// The fetch failed; the entry was released.
    Failed,
    /// Completion from a torn-down instance or for an unknown key.
    Discarded,
}

/// One WMS-backed raster layer.
///
/// All state is mutated through `&mut self`, one viewport event or
/// completion at a time.
#[derive(Debug)]
pub struct RasterLayer {
    name: String,
    source: WmsSource,
    config: RasterConfig,
    request_crs: String,
    /// Target CRS to request CRS.
    to_request: Transform,
    origin: LocalOrigin,
    /// Hard clipping limit, in target CRS.
    boundary: Option<BoundingBox>,
    tiles: HashMap<TileKey, TileEntry>,
    /// Clipped bbox of the last single-image request.
    last_bbox: Option<BoundingBox>,
    /// Unclipped view extent of the last request; change detection runs
    /// against this one.
    last_extent: Option<BoundingBox>,
    /// Extent of the single image currently shown.
    shown_bbox: Option<BoundingBox>,
    shown_extent: Option<BoundingBox>,
    last_update: Option<Instant>,
    group: Option<NodeId>,
    generation: u64,
    cancel: CancellationToken,
}

impl RasterLayer {
    /// Prepares a layer; nothing is requested until the first update.
    ///
    /// # Errors
    ///
    /// `WmsError::Crs` if the target or request CRS is not registered,
    /// `WmsError::InvalidBbox` if the URL's BBOX is malformed.
    pub fn new(
        name: impl Into<String>,
        source: WmsSource,
        config: RasterConfig,
        origin: LocalOrigin,
        registry: &CrsRegistry,
    ) -> Result<Self, WmsError> {
        let name = name.into();
        let declared = source.declared_crs();
        let request_crs = config
            .request_crs
            .clone()
            .or_else(|| declared.clone())
            .unwrap_or_else(|| config.target_crs.clone());
        let to_request = registry.transform(&config.target_crs, &request_crs)?;

        // BBOX is expressed in the URL's own CRS.
        let boundary = match source.boundary()? {
            Some(bbox) => {
                let bbox_crs = declared.as_deref().unwrap_or(&request_crs);
                Some(registry.transform(bbox_crs, &config.target_crs)?.apply_bbox(&bbox))
            }
            None => None,
        };

        debug!(
            layer = %name,
            mode = %config.mode,
            target_crs = %config.target_crs,
            request_crs = %request_crs,
            boundary = ?boundary,
            "Raster layer prepared"
        );

        Ok(Self {
            name,
            source,
            config,
            request_crs,
            to_request,
            origin,
            boundary,
            tiles: HashMap::new(),
            last_bbox: None,
            last_extent: None,
            shown_bbox: None,
            shown_extent: None,
            last_update: None,
            group: None,
            generation: 0,
            cancel: CancellationToken::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &WmsSource {
        &self.source
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn request_crs(&self) -> &str {
        &self.request_crs
    }

    pub fn origin(&self) -> &LocalOrigin {
        &self.origin
    }

    pub fn boundary(&self) -> Option<&BoundingBox> {
        self.boundary.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Continues the generation sequence of a previous instance of the same
    /// logical layer, so its late completions stay stale.
    pub(crate) fn continue_generation(&mut self, previous: u64) {
        self.generation = self.generation.max(previous);
    }

    /// Group node holding the layer's meshes, while attached.
    pub fn group(&self) -> Option<NodeId> {
        self.group
    }

    pub fn is_active(&self) -> bool {
        self.group.is_some()
    }

    pub fn last_bbox(&self) -> Option<&BoundingBox> {
        self.last_bbox.as_ref()
    }

    pub fn tile(&self, key: &TileKey) -> Option<&TileEntry> {
        self.tiles.get(key)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (&TileKey, &TileEntry)> {
        self.tiles.iter()
    }

    /// Number of fetches in flight.
    pub fn in_flight(&self) -> usize {
        self.tiles.values().filter(|t| t.is_loading()).count()
    }

    /// Name of the layer group in the scene.
    pub fn group_name(&self) -> String {
        match self.source.layers() {
            Some(layers) if !layers.is_empty() => format!("WMS Layer - {}", layers),
            _ => format!("WMS Layer - {}", self.name),
        }
    }

    /// Attaches the (empty) layer group to the scene.
    pub fn attach<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) -> NodeId {
        if let Some(group) = self.group {
            return group;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let group = Group::new(self.group_name())
            .with_metadata("layer", self.name.clone())
            .with_metadata("source", self.source.base_url().as_str())
            .with_metadata("crs", self.config.target_crs.clone())
            .with_metadata("request_crs", self.request_crs.clone())
            .with_metadata("mode", self.config.mode.to_string());
        let id = scene.attach(None, SceneNode::Group(group));
        self.group = Some(id);
        info!(layer = %self.name, group = %id, generation = self.generation, "Raster layer attached");
        id
    }

    /// Cancels in-flight fetches and disposes every owned mesh.
    ///
    /// Completions issued before this call are discarded afterwards.
    pub fn detach<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        self.cancel.cancel();
        self.generation += 1;
        let Some(group) = self.group.take() else {
            return;
        };
        let meshes = self.tiles.values().filter(|t| t.mesh.is_some()).count();
        scene.detach(group);
        self.tiles.clear();
        self.last_bbox = None;
        self.last_extent = None;
        self.shown_bbox = None;
        self.shown_extent = None;
        self.last_update = None;
        info!(layer = %self.name, meshes, "Raster layer detached");
    }

    /// Handles one camera change.
    pub fn update<S, D>(
        &mut self,
        camera: &Camera,
        now: Instant,
        scene: &mut S,
        dispatcher: &D,
    ) -> UpdateOutcome
    where
        S: SceneGraph + ?Sized,
        D: ImageDispatcher + ?Sized,
    {
        if !self.is_active() {
            return UpdateOutcome::Inactive;
        }
        match self.config.mode {
            StreamMode::Single => self.update_single(camera, now, dispatcher),
            StreamMode::Grid => self.update_grid(camera, now, scene, dispatcher),
        }
    }

    fn throttled(&self, now: Instant) -> bool {
        let interval = self.config.min_update_interval;
        !interval.is_zero()
            && self
                .last_update
                .is_some_and(|last| now.saturating_duration_since(last) < interval)
    }

    fn update_single<D>(&mut self, camera: &Camera, now: Instant, dispatcher: &D) -> UpdateOutcome
    where
        D: ImageDispatcher + ?Sized,
    {
        if self.tiles.get(&TileKey::Single).is_some_and(TileEntry::is_loading) {
            return UpdateOutcome::Busy;
        }
        if self.throttled(now) {
            return UpdateOutcome::Throttled;
        }
        let Some(footprint) = camera.ground_footprint(&self.origin) else {
            return UpdateOutcome::NoFootprint;
        };

        let thresholds = self.config.thresholds;
        let decision = thresholds.detect(self.last_extent.as_ref(), &footprint);
        if !decision.should_update() {
            return UpdateOutcome::Unchanged;
        }
        let extent = thresholds.request_extent(decision, self.last_extent.as_ref(), &footprint);

        let clipped = match &self.boundary {
            Some(boundary) => extent.intersection(boundary),
            None if extent.is_degenerate() => None,
            None => Some(extent),
        };
        let Some(bbox) = clipped else {
            debug!(layer = %self.name, extent = %extent, "View outside layer boundary");
            return UpdateOutcome::OutOfBounds;
        };

        let width = self.pixels(bbox.width());
        let height = self.pixels(bbox.height());
        debug!(
            layer = %self.name,
            decision = ?decision,
            bbox = %bbox,
            width,
            height,
            "Requesting image"
        );

        self.last_bbox = Some(bbox);
        self.last_extent = Some(extent);
        self.last_update = Some(now);
        let entry = self
            .tiles
            .entry(TileKey::Single)
            .or_insert_with(|| TileEntry::loading(bbox, width, height));
        entry.bbox = bbox;
        entry.width = width;
        entry.height = height;
        entry.status = TileStatus::Loading;

        dispatcher.dispatch(self.fetch_request(TileKey::Single, bbox, width, height));
        UpdateOutcome::Requested(1)
    }

    fn update_grid<S, D>(
        &mut self,
        camera: &Camera,
        now: Instant,
        scene: &mut S,
        dispatcher: &D,
    ) -> UpdateOutcome
    where
        S: SceneGraph + ?Sized,
        D: ImageDispatcher + ?Sized,
    {
        if self.throttled(now) {
            return UpdateOutcome::Throttled;
        }
        let tile_size = self.config.tile_size;
        let (x, y) = camera.map_position(&self.origin);
        let center = grid_cell(x, y, tile_size);
        let radius = self.config.view_radius;

        self.evict_distant(center, u64::from(radius) + 1, scene);

        let mut requested = 0;
        let mut outside = 0;
        for (col, row) in neighborhood(center, radius) {
            let key = TileKey::grid(tile_size, col, row);
            if self
                .tiles
                .get(&key)
                .is_some_and(|t| t.status != TileStatus::Error)
            {
                continue;
            }
            let bbox = grid_bbox(col, row, tile_size);
            if self
                .boundary
                .is_some_and(|boundary| bbox.intersection(&boundary).is_none())
            {
                outside += 1;
                continue;
            }

            let px = self.config.tile_px;
            self.tiles.insert(key, TileEntry::loading(bbox, px, px));
            debug!(layer = %self.name, key = %key, bbox = %bbox, "Requesting tile");
            dispatcher.dispatch(self.fetch_request(key, bbox, px, px));
            requested += 1;
        }

        if requested > 0 {
            self.last_update = Some(now);
            UpdateOutcome::Requested(requested)
        } else if outside > 0 && self.tiles.is_empty() {
            UpdateOutcome::OutOfBounds
        } else {
            UpdateOutcome::Unchanged
        }
    }

    /// Drops settled tiles farther than `max_distance` cells from `center`.
    fn evict_distant<S>(&mut self, center: (i64, i64), max_distance: u64, scene: &mut S)
    where
        S: SceneGraph + ?Sized,
    {
        let distant: Vec<TileKey> = self
            .tiles
            .iter()
            .filter(|(key, entry)| {
                !entry.is_loading()
                    && match key {
                        TileKey::Grid { col, row, .. } => {
                            cell_distance((*col, *row), center) > max_distance
                        }
                        TileKey::Single => false,
                    }
            })
            .map(|(key, _)| *key)
            .collect();

        for key in distant {
            if let Some(mesh) = self.tiles.remove(&key).and_then(|e| e.mesh) {
                scene.detach(mesh);
            }
            debug!(layer = %self.name, key = %key, "Evicted tile");
        }
    }

    fn pixels(&self, extent: f64) -> u32 {
        pixel_size(
            extent,
            self.config.pixels_per_unit,
            self.config.min_tile_px,
            self.config.max_tile_px,
        )
    }

    fn fetch_request(&self, key: TileKey, bbox: BoundingBox, width: u32, height: u32) -> FetchRequest {
        let request = GetMapRequest {
            bbox: self.to_request.apply_bbox(&bbox),
            crs: self.request_crs.clone(),
            width,
            height,
        };
        FetchRequest {
            layer: self.name.clone(),
            key,
            generation: self.generation,
            url: request.to_url(&self.source).to_string(),
            credentials: self.source.credentials().cloned(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Applies a fetch completion.
    ///
    /// On success the mesh previously shown for the key is disposed and
    /// detached before the new plane is attached. On failure the entry is
    /// released so a later viewport change can retry it.
    pub fn complete<S>(&mut self, completion: FetchCompletion, scene: &mut S) -> CompletionOutcome
    where
        S: SceneGraph + ?Sized,
    {
        let FetchCompletion {
            key,
            generation,
            result,
            ..
        } = completion;

        let Some(group) = self.group else {
            debug!(layer = %self.name, key = %key, "Completion for detached layer discarded");
            return CompletionOutcome::Discarded;
        };
        if generation != self.generation {
            debug!(
                layer = %self.name,
                key = %key,
                generation,
                current = self.generation,
                "Stale completion discarded"
            );
            return CompletionOutcome::Discarded;
        }
        if !self.tiles.get(&key).is_some_and(TileEntry::is_loading) {
            debug!(layer = %self.name, key = %key, "Completion without pending request discarded");
            return CompletionOutcome::Discarded;
        }

        let texture = match result {
            Ok(texture) => texture,
            Err(e) => {
                warn!(layer = %self.name, key = %key, error = %e, "Image fetch failed");
                self.release(key);
                return CompletionOutcome::Failed;
            }
        };

        let transparent = self.source.is_transparent_format();
        let origin = self.origin;
        let Some(entry) = self.tiles.get_mut(&key) else {
            return CompletionOutcome::Discarded;
        };

        if let Some(old) = entry.mesh.take() {
            scene.detach(old);
        }

        let (cx, cy) = entry.bbox.center();
        let name = match key {
            TileKey::Single => IMAGE_PLANE_NAME.to_string(),
            TileKey::Grid { .. } => format!("tile_{}", key),
        };
        let mesh = Mesh::new(
            name,
            Geometry::Plane {
                width: entry.bbox.width(),
                depth: entry.bbox.height(),
            },
            Material::textured(texture, transparent),
            map_to_scene(cx, cy, origin.z, &origin),
        );
        let id = scene.attach(Some(group), SceneNode::Mesh(mesh));
        entry.mesh = Some(id);
        entry.status = TileStatus::Loaded;
        let bbox = entry.bbox;

        if key == TileKey::Single {
            self.shown_bbox = Some(bbox);
            self.shown_extent = self.last_extent;
        }
        debug!(layer = %self.name, key = %key, mesh = %id, "Image attached");
        CompletionOutcome::Attached(id)
    }

    fn release(&mut self, key: TileKey) {
        match key {
            TileKey::Single => {
                let keep = match self.tiles.get_mut(&key) {
                    Some(entry) if entry.mesh.is_some() => {
                        entry.status = TileStatus::Loaded;
                        if let Some(shown) = self.shown_bbox {
                            entry.bbox = shown;
                        }
                        true
                    }
                    _ => false,
                };
                if !keep {
                    self.tiles.remove(&key);
                }
                self.last_bbox = self.shown_bbox;
                self.last_extent = self.shown_extent;
            }
            TileKey::Grid { .. } => {
                if let Some(entry) = self.tiles.get_mut(&key) {
                    entry.status = TileStatus::Error;
                }
            }
        }
    }
}
