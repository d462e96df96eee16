//! TerraLayer - geospatial layers for a local 3D scene
//!
//! This library imports two kinds of geospatial data into a scene graph
//! expressed in a single projected target CRS:
//!
//! - **GML vector features** ([`gml`]): parsed, reprojected and turned into
//!   extruded solids, lines and markers.
//! - **WMS raster imagery** ([`wms`]): streamed as textured ground planes
//!   that follow the camera, either as one image or as a tile grid.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use terralayer::crs::CrsRegistry;
//! use terralayer::gml::{GmlLoader, GmlOptions};
//! use terralayer::scene::{LayerManager, MemoryScene};
//!
//! # async fn run() -> terralayer::error::Result<()> {
//! let registry = Arc::new(CrsRegistry::with_defaults());
//! let loader = GmlLoader::new(registry, GmlOptions::new().with_layer_name("parcels"));
//! let layer = loader.load_path("parcels.gml").await?;
//!
//! let mut scene = MemoryScene::new();
//! let mut layers = LayerManager::new();
//! layers.attach_features(layer, &mut scene);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coord;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod gml;
pub mod http;
pub mod logging;
pub mod scene;
pub mod wms;

pub use error::ImportError;
