//! Reference ellipsoids.

/// Earth ellipsoid given by semi-major axis and flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in metres.
    pub a: f64,
    /// Flattening.
    pub f: f64,
}

impl Ellipsoid {
    /// WGS84 (EPSG:7030).
    pub const WGS84: Self = Self {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    /// GRS80 (EPSG:7019), used by ETRS89.
    pub const GRS80: Self = Self {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// International 1924 (Hayford), used by ED50.
    pub const INTERNATIONAL_1924: Self = Self {
        a: 6_378_388.0,
        f: 1.0 / 297.0,
    };

    pub const fn new(a: f64, f: f64) -> Self {
        Self { a, f }
    }

    /// Sphere of the given radius.
    pub const fn sphere(radius: f64) -> Self {
        Self { a: radius, f: 0.0 }
    }

    /// Ellipsoid from semi-major and semi-minor axes.
    pub fn from_axes(a: f64, b: f64) -> Self {
        Self { a, f: (a - b) / a }
    }

    /// Look up a proj4 `+ellps=` name.
    pub fn from_proj_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wgs84" => Some(Self::WGS84),
            "grs80" => Some(Self::GRS80),
            "intl" => Some(Self::INTERNATIONAL_1924),
            _ => None,
        }
    }

    /// First eccentricity squared.
    #[inline]
    pub fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    /// First eccentricity.
    #[inline]
    pub fn e(&self) -> f64 {
        self.e2().sqrt()
    }

    /// Third flattening `n = f / (2 - f)`.
    #[inline]
    pub fn n(&self) -> f64 {
        self.f / (2.0 - self.f)
    }
}
