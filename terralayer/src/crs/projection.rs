//! Map projections.
//!
//! Every projection converts between geographic longitude/latitude in
//! degrees and projected `(x, y)` in its own units. Transverse Mercator uses
//! the Krüger series truncated at fourth order in the third flattening,
//! which keeps round-trip error well below a millimetre inside a UTM zone.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::ellipsoid::Ellipsoid;

/// Latitude limit of the spherical Web Mercator projection.
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Supported projection families.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees; the identity on geographic coordinates.
    Geographic,
    /// Spherical ("pseudo") Mercator as used by EPSG:3857.
    WebMercator { radius: f64 },
    /// Transverse Mercator, UTM zones included.
    TransverseMercator(TransverseMercator),
}

impl Projection {
    /// Projects geographic `(lon, lat)` in degrees.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator { radius } => {
                let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
                let x = radius * lon.to_radians();
                let y = radius * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                (x, y)
            }
            Projection::TransverseMercator(tm) => tm.forward(lon, lat),
        }
    }

    /// Recovers geographic `(lon, lat)` in degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator { radius } => {
                let lon = (x / radius).to_degrees();
                let lat = (2.0 * (y / radius).exp().atan() - FRAC_PI_2).to_degrees();
                (lon, lat)
            }
            Projection::TransverseMercator(tm) => tm.inverse(x, y),
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::Geographic)
    }
}

/// Transverse Mercator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Central meridian in degrees.
    pub lon_0: f64,
    /// Latitude of origin in degrees.
    pub lat_0: f64,
    /// Scale factor on the central meridian.
    pub k_0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// UTM zone `1..=60` on the given ellipsoid.
    pub fn utm(zone: u8, north: bool, ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            lon_0: f64::from(zone) * 6.0 - 183.0,
            lat_0: 0.0,
            k_0: 0.9996,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
        }
    }

    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let s = Series::new(&self.ellipsoid);
        let dlam = wrap_pi((lon - self.lon_0).to_radians());
        let t = s.conformal_tan(lat.to_radians());

        let xi_p = t.atan2(dlam.cos());
        let eta_p = (dlam.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, alpha) in s.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let scale = self.k_0 * s.rectifying_radius;
        let x = self.false_easting + scale * eta;
        let y = self.false_northing + scale * (xi - self.origin_xi(&s));
        (x, y)
    }

    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let s = Series::new(&self.ellipsoid);
        let scale = self.k_0 * s.rectifying_radius;
        let xi = (y - self.false_northing) / scale + self.origin_xi(&s);
        let eta = (x - self.false_easting) / scale;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in s.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).clamp(-1.0, 1.0).asin();
        let mut phi = chi;
        for (j, delta) in s.delta.iter().enumerate() {
            phi += delta * (2.0 * (j + 1) as f64 * chi).sin();
        }
        let lam = eta_p.sinh().atan2(xi_p.cos());

        (self.lon_0 + lam.to_degrees(), phi.to_degrees())
    }

    /// Normalised meridian distance of the latitude of origin.
    fn origin_xi(&self, s: &Series) -> f64 {
        if self.lat_0 == 0.0 {
            return 0.0;
        }
        let xi_p = s.conformal_tan(self.lat_0.to_radians()).atan();
        let mut xi = xi_p;
        for (j, alpha) in s.alpha.iter().enumerate() {
            xi += alpha * (2.0 * (j + 1) as f64 * xi_p).sin();
        }
        xi
    }
}

/// Krüger series coefficients for one ellipsoid.
struct Series {
    e: f64,
    rectifying_radius: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
}

impl Series {
    fn new(ellipsoid: &Ellipsoid) -> Self {
        let n = ellipsoid.n();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        Self {
            e: ellipsoid.e(),
            rectifying_radius: ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
                61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
                49561.0 * n4 / 161_280.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
                n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
                17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
                4397.0 * n4 / 161_280.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
                56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
                4279.0 * n4 / 630.0,
            ],
        }
    }

    /// Tangent of the conformal latitude.
    fn conformal_tan(&self, phi: f64) -> f64 {
        let sin_phi = phi.sin();
        (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh()
    }
}

fn wrap_pi(angle: f64) -> f64 {
    let mut a = angle;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a < -PI {
        a += 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm31n() -> TransverseMercator {
        TransverseMercator::utm(31, true, Ellipsoid::GRS80)
    }

    #[test]
    fn test_utm_central_meridian() {
        assert_eq!(utm31n().lon_0, 3.0);
        assert_eq!(TransverseMercator::utm(30, true, Ellipsoid::GRS80).lon_0, -3.0);
        assert_eq!(TransverseMercator::utm(1, true, Ellipsoid::WGS84).lon_0, -177.0);
    }

    #[test]
    fn test_utm_origin_on_equator() {
        let (x, y) = utm31n().forward(3.0, 0.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let south = TransverseMercator::utm(31, false, Ellipsoid::GRS80);
        let (_, y) = south.forward(3.0, 0.0);
        assert!((y - 10_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_meridian_arc_at_45() {
        // GRS80 meridian distance to 45° is 4 984 944.378 m.
        let (x, y) = utm31n().forward(3.0, 45.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!((y - 0.9996 * 4_984_944.378).abs() < 0.01);
    }

    #[test]
    fn test_barcelona_utm31() {
        let (x, y) = utm31n().forward(2.1734, 41.3851);
        assert!((x - 430_887.56).abs() < 0.05, "x = {}", x);
        assert!((y - 4_581_837.85).abs() < 0.05, "y = {}", y);
    }

    #[test]
    fn test_tm_inverse() {
        let tm = utm31n();
        let (x, y) = tm.forward(6.0, 60.0);
        let (lon, lat) = tm.inverse(x, y);
        assert!((lon - 6.0).abs() < 1e-9);
        assert!((lat - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_tm_nonzero_latitude_of_origin() {
        let tm = TransverseMercator {
            lat_0: 40.0,
            ..utm31n()
        };
        let (_, y) = tm.forward(3.0, 40.0);
        assert!(y.abs() < 1e-6);

        let (lon, lat) = tm.inverse(12_345.0, -6_789.0);
        let (x, y) = tm.forward(lon, lat);
        assert!((x - 12_345.0).abs() < 1e-4);
        assert!((y + 6_789.0).abs() < 1e-4);
    }

    #[test]
    fn test_web_mercator() {
        let merc = Projection::WebMercator { radius: 6_378_137.0 };
        let (x, y) = merc.forward(2.1734, 41.3851);
        assert!((x - 241_941.78).abs() < 0.01);
        assert!((y - 5_069_310.85).abs() < 0.01);

        let (lon, lat) = merc.inverse(x, y);
        assert!((lon - 2.1734).abs() < 1e-9);
        assert!((lat - 41.3851).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_clamps_poles() {
        let merc = Projection::WebMercator { radius: 6_378_137.0 };
        let (_, y_pole) = merc.forward(0.0, 90.0);
        let (_, y_max) = merc.forward(0.0, WEB_MERCATOR_MAX_LAT);
        assert!(y_pole.is_finite());
        assert_eq!(y_pole, y_max);
    }

    #[test]
    fn test_geographic_is_identity() {
        assert_eq!(Projection::Geographic.forward(1.5, 2.5), (1.5, 2.5));
        assert_eq!(Projection::Geographic.inverse(1.5, 2.5), (1.5, 2.5));
    }
}
