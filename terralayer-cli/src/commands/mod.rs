//! CLI command implementations.

pub mod common;
pub mod config;
pub mod crs;
pub mod gml;
pub mod wms;
