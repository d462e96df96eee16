//! Ring and polygon construction.
//!
//! Flat coordinate lists become closed [`Ring`]s relative to a
//! [`LocalOrigin`](crate::coord::LocalOrigin); an outer ring plus holes
//! becomes a [`SolidDescriptor`] that a [`SolidBuilder`] turns into a scene
//! node. Geometry failures are per feature and never abort a batch.

mod error;
mod ring;
mod solid;

pub use error::GeometryError;
pub use ring::{to_ring, Ring, Winding};
pub use solid::{build_polygon, ExtrusionBuilder, Profile, SolidBuilder, SolidDescriptor};
