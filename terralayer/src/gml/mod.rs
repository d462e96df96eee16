//! GML vector feature loading.
//!
//! A load runs through fixed stages: parse the XML, detect the dialect from
//! the declared version, detect the feature schema (feature type and
//! geometry field), detect and normalise the SRS, then extract features.
//! Document-level failures abort the load with a [`GmlError`]; per-feature
//! geometry failures only bump the `skipped` counter of the [`LoadReport`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use terralayer::crs::CrsRegistry;
//! use terralayer::gml::{GmlLoader, GmlOptions};
//!
//! let loader = GmlLoader::new(Arc::new(CrsRegistry::with_defaults()), GmlOptions::new());
//! let layer = loader.load_str(&xml)?;
//! println!("{} solids", layer.report.solids);
//! ```

mod decode;
mod dialect;
mod error;
mod feature;
mod loader;
mod schema;

pub use decode::DecodeError;
pub use dialect::{FeatureReader, GmlDialect, ReadOptions, DEFAULT_FEATURE_ID};
pub use error::GmlError;
pub use feature::{FeatureGeometry, PolygonCoords, VectorFeature};
pub use loader::{
    FeatureLayer, GmlLoader, GmlOptions, LoadReport, ParseStage, DEFAULT_EXTRUSION_HEIGHT,
    DEFAULT_LAYER_NAME, DEFAULT_TARGET_CRS,
};
pub use schema::{detect_schema, detect_srs, detect_version, FeatureSchema, DEFAULT_VERSION};
