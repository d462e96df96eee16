//! WMS raster layers.
//!
//! A [`RasterLayer`] turns camera changes into GetMap requests and fetched
//! images into ground-aligned planes. Two strategies are supported:
//!
//! - **single image**: one image covering the visible ground footprint,
//!   re-requested only when the view pans or zooms past the configured
//!   thresholds;
//! - **fixed grid**: tiles of a fixed size around the camera, each cached
//!   under its grid cell.
//!
//! Layers never await a fetch. Requests go to an [`ImageDispatcher`] and
//! come back as [`FetchCompletion`]s, which the [`RasterStreamer`] applies
//! one at a time.

mod camera;
mod change;
pub(crate) mod dispatch;
mod error;
mod layer;
mod params;
mod request;
mod static_image;
mod streamer;
mod tile;

pub use camera::Camera;
pub use change::{
    ChangeDecision, ChangeThresholds, DEFAULT_UPDATE_THRESHOLD, DEFAULT_ZOOM_IN_THRESHOLD,
    DEFAULT_ZOOM_OUT_THRESHOLD,
};
pub use dispatch::{
    decode_image, fetch_image, FetchCompletion, FetchRequest, ImageDispatcher, TokioDispatcher,
    DEFAULT_COMPLETION_CHANNEL_CAPACITY,
};
pub use error::WmsError;
pub use layer::{
    CompletionOutcome, RasterConfig, RasterLayer, StreamMode, UpdateOutcome,
    DEFAULT_PIXELS_PER_UNIT, DEFAULT_TILE_PX, DEFAULT_TILE_SIZE, DEFAULT_VIEW_RADIUS,
};
pub use params::{is_lat_lon_order, WmsSource, DEFAULT_FORMAT, DEFAULT_WMS_VERSION};
pub use request::{pixel_size, GetMapRequest, DEFAULT_MAX_TILE_PX, DEFAULT_MIN_TILE_PX};
pub use static_image::{import_static_image, DEFAULT_IMAGE_PX, WMS_LAYER_NAME};
pub use streamer::{RasterStreamer, ViewEvent};
pub use tile::{grid_bbox, grid_cell, TileEntry, TileKey, TileStatus};

#[cfg(test)]
pub use dispatch::tests::RecordingDispatcher;
