// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The observation record (`obs_t`): one ray descriptor per measurement,
//! geodetic observer/view-point/tangent-point positions, and the
//! per-channel transmittance and radiance the forward model fills in.

use hifitime::Epoch;

use crate::atmosphere::Atmosphere;
use crate::geodesy::{cart2geo, geo2cart, GeoPoint};
use crate::raytrace::{tangent_point, trace, LineOfSight, RaytraceError};

/// One ray descriptor: observer and view-point geometry fix the initial
/// line of sight; `tangent`, `tau`, and `rad` are filled in by tracing
/// and integrating the forward model.
#[derive(Debug, Clone)]
pub struct Observation {
    pub time: Epoch,
    /// Observer position: altitude (km), longitude/latitude (degrees).
    pub observer: GeoPoint,
    /// View-point position fixing the ray's initial direction.
    pub view_point: GeoPoint,
    /// Tangent point (minimum-altitude sample), filled by [`trace_ray`].
    pub tangent: Option<GeoPoint>,
    /// Per-channel path transmittance, filled by the RT integrator.
    pub tau: Vec<f64>,
    /// Per-channel radiance, filled by the RT integrator.
    pub rad: Vec<f64>,
}

impl Observation {
    pub fn new(time: Epoch, observer: GeoPoint, view_point: GeoPoint) -> Self {
        Self {
            time,
            observer,
            view_point,
            tangent: None,
            tau: Vec::new(),
            rad: Vec::new(),
        }
    }
}

/// An ordered set of ray descriptors, the observation-side counterpart of
/// [`crate::atmosphere::Atmosphere`].
#[derive(Debug, Clone, Default)]
pub struct Observations {
    pub rays: Vec<Observation>,
}

/// Trace `obs`'s line of sight through `atm` and write the tangent point
/// (converted back to geodetic coordinates) onto `obs`, mirroring the
/// original implementation's `raytrace` writing `tpz`/`tplon`/`tplat`
/// back onto the observation record.
pub fn trace_ray(
    obs: &mut Observation,
    atm: &Atmosphere,
    rayds: f64,
    raydz: f64,
    refraction: bool,
    max_points: usize,
) -> Result<LineOfSight, RaytraceError> {
    let observer = geo2cart(&obs.observer);
    let view_point = geo2cart(&obs.view_point);
    let los = trace(atm, observer, view_point, rayds, raydz, refraction, max_points)?;
    obs.tangent = tangent_point(&los).map(|p| cart2geo(&p.position));
    Ok(los)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{CloudParams, SurfaceParams};

    fn sample_atm() -> Atmosphere {
        Atmosphere {
            z: vec![0.0, 10.0, 20.0, 50.0, 100.0],
            p: vec![1013.25, 265.0, 55.0, 0.8, 0.0003],
            t: vec![288.0, 223.0, 217.0, 270.0, 195.0],
            q: vec![vec![0.01, 0.001, 0.0001, 0.00001, 0.0]],
            k: vec![],
            cloud: CloudParams::default(),
            surface: SurfaceParams::default(),
        }
    }

    #[test]
    fn trace_ray_fills_tangent_point() {
        let atm = sample_atm();
        let mut obs = Observation::new(
            Epoch::from_gpst_seconds(1_000_000_000.0),
            GeoPoint {
                lon: 0.0,
                lat: 0.0,
                alt: 500.0,
            },
            GeoPoint {
                lon: 2.0,
                lat: 0.0,
                alt: 20.0,
            },
        );
        assert!(obs.tangent.is_none());
        let los = trace_ray(&mut obs, &atm, 5.0, 2.0, false, 4096).unwrap();
        assert!(!los.points.is_empty());
        let tangent = obs.tangent.expect("tangent point must be filled after tracing");
        assert!((tangent.alt - los.tangent_altitude).abs() < 1e-9);
    }
}
