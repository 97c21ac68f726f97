// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cartesian/geodetic coordinate conversions on a spherical Earth model, and
//! small vector arithmetic shared by the ray tracer and line-of-sight code.

use crate::constants::RE;

/// A plain 3-vector in an Earth-centred Cartesian frame, km.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn scale(&self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        self.sub(other).norm()
    }
}

/// A geodetic point: longitude/latitude in degrees, altitude in km above the
/// mean spherical Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

/// Convert a geodetic point to Earth-centred Cartesian coordinates.
pub fn geo2cart(p: &GeoPoint) -> Vec3 {
    let r = RE + p.alt;
    let lat = p.lat.to_radians();
    let lon = p.lon.to_radians();
    Vec3::new(
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    )
}

/// Convert an Earth-centred Cartesian point to geodetic coordinates.
pub fn cart2geo(v: &Vec3) -> GeoPoint {
    let r = v.norm();
    let lat = (v.z / r).asin().to_degrees();
    let lon = v.y.atan2(v.x).to_degrees();
    GeoPoint {
        lon,
        lat,
        alt: r - RE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn round_trip_equator() {
        let p = GeoPoint {
            lon: 12.0,
            lat: 0.0,
            alt: 10.0,
        };
        let v = geo2cart(&p);
        let back = cart2geo(&v);
        assert_abs_diff_eq!(back.lon, p.lon, epsilon = 1e-9);
        assert_abs_diff_eq!(back.lat, p.lat, epsilon = 1e-9);
        assert_abs_diff_eq!(back.alt, p.alt, epsilon = 1e-6);
    }

    #[test]
    fn round_trip_pole() {
        let p = GeoPoint {
            lon: 0.0,
            lat: 89.9,
            alt: 0.0,
        };
        let v = geo2cart(&p);
        let back = cart2geo(&v);
        assert_abs_diff_eq!(back.lat, p.lat, epsilon = 1e-9);
        assert_abs_diff_eq!(back.alt, p.alt, epsilon = 1e-6);
    }

    #[test]
    fn vec3_arithmetic() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_abs_diff_eq!(a.dot(&b), 32.0);
        assert_abs_diff_eq!(a.add(&b).x, 5.0);
        assert_abs_diff_eq!(a.sub(&b).x, -3.0);
        assert_abs_diff_eq!(a.scale(2.0).z, 6.0);
    }
}
