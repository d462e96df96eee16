//! Coordinate reference systems.
//!
//! A [`CrsRegistry`] holds named, immutable [`CrsDefinition`]s and produces
//! [`Transform`] values between any two of them. Transforms go through
//! geographic longitude/latitude; datum shifts are not modelled, so WGS84
//! and ETRS89 based systems are treated as coincident.
//!
//! # Example
//!
//! ```
//! use terralayer::crs::CrsRegistry;
//!
//! let registry = CrsRegistry::with_defaults();
//! let to_utm = registry.transform("EPSG:4326", "EPSG:25831").unwrap();
//! let (x, y) = to_utm.apply(3.0, 0.0);
//! assert!((x - 500_000.0).abs() < 1e-6 && y.abs() < 1e-6);
//! ```

mod definition;
mod ellipsoid;
mod error;
mod normalize;
mod projection;
mod registry;

pub use definition::CrsDefinition;
pub use ellipsoid::Ellipsoid;
pub use error::CrsError;
pub use normalize::{is_authority_axis_order, normalize_srs};
pub use projection::{Projection, TransverseMercator, WEB_MERCATOR_MAX_LAT};
pub use registry::{CrsRegistry, Transform};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> CrsRegistry {
        CrsRegistry::with_defaults()
    }

    proptest! {
        #[test]
        fn test_geographic_utm_roundtrip(
            zone in 28u8..=38,
            dlon in -3.0..3.0_f64,
            lat in 0.0..72.0_f64,
        ) {
            let registry = registry();
            let lon = f64::from(zone) * 6.0 - 183.0 + dlon;
            let target = format!("EPSG:{}", 25800 + u32::from(zone));
            let forward = registry.transform("EPSG:4326", &target).unwrap();
            let back = registry.transform(&target, "EPSG:4326").unwrap();

            let (x, y) = forward.apply(lon, lat);
            let (rlon, rlat) = back.apply(x, y);

            prop_assert!((rlon - lon).abs() < 1e-8, "lon {} -> {}", lon, rlon);
            prop_assert!((rlat - lat).abs() < 1e-8, "lat {} -> {}", lat, rlat);
        }

        #[test]
        fn test_projected_pairs_roundtrip(
            x in 300_000.0..700_000.0_f64,
            y in 4_000_000.0..5_000_000.0_f64,
        ) {
            let registry = registry();
            for target in ["EPSG:3857", "EPSG:32631", "EPSG:25830", "EPSG:4258"] {
                let there = registry.transform("EPSG:25831", target).unwrap();
                let back = registry.transform(target, "EPSG:25831").unwrap();
                let (tx, ty) = there.apply(x, y);
                let (rx, ry) = back.apply(tx, ty);

                prop_assert!((rx - x).abs() < 1e-3, "{}: x {} -> {}", target, x, rx);
                prop_assert!((ry - y).abs() < 1e-3, "{}: y {} -> {}", target, y, ry);
            }
        }

        #[test]
        fn test_identity_when_equal(x in -1.0e7..1.0e7_f64, y in -1.0e7..1.0e7_f64) {
            let registry = registry();
            for id in registry.ids() {
                let t = registry.transform(&id, &id).unwrap();
                prop_assert_eq!(t.apply(x, y), (x, y));
            }
        }
    }

    #[test]
    fn test_all_registered_pairs_roundtrip_at_barcelona() {
        let registry = registry();
        let wgs84 = registry.transform("EPSG:25831", "EPSG:4326").unwrap();
        let (lon, lat) = wgs84.apply(430_887.56, 4_581_837.85);

        for source in registry.ids() {
            let from_geo = registry.transform("EPSG:4326", &source).unwrap();
            let (sx, sy) = from_geo.apply(lon, lat);
            for target in registry.ids() {
                let t = registry.transform(&source, &target).unwrap();
                let (tx, ty) = t.apply(sx, sy);
                let (rx, ry) = t.inverse().apply(tx, ty);
                let tol = if registry.get(&source).unwrap().is_geographic() {
                    1e-7
                } else {
                    1e-2
                };
                assert!(
                    (rx - sx).abs() < tol && (ry - sy).abs() < tol,
                    "{} -> {} -> {}: ({}, {}) vs ({}, {})",
                    source,
                    target,
                    source,
                    rx,
                    ry,
                    sx,
                    sy
                );
            }
        }
    }
}
