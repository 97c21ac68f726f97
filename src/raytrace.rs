// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The refractive ray tracer: integrates a line of sight through the
//! atmosphere starting at an observer and pointed toward a view point,
//! bending the path via Snell's law in spherical symmetry and
//! terminating on a surface hit or an upward exit to space (not on
//! reaching the view point, which only fixes the initial direction).

use log::warn;
use thiserror::Error;

use crate::atmosphere::{Atmosphere, AtmosphereError};
use crate::constants::REFRAC;
use crate::geodesy::{cart2geo, Vec3};

/// Errors from ray tracing.
#[derive(Error, Debug)]
pub enum RaytraceError {
    #[error("line of sight exceeded the configured cap of {0} points")]
    TooManyPoints(usize),

    #[error(transparent)]
    Atmosphere(#[from] AtmosphereError),

    #[error("observer and view point coincide")]
    DegenerateGeometry,
}

/// One point sampled along a line of sight.
#[derive(Debug, Clone)]
pub struct LosPoint {
    pub position: Vec3,
    pub altitude: f64,
    /// Cumulative path length from the observer, km.
    pub path_length: f64,
}

/// A traced line of sight: an ordered sequence of points from the
/// observer toward (and, unless it hits the surface first, beyond) the
/// view point, plus the tangent point (the point of minimum altitude)
/// and whether the ray terminated on the surface.
#[derive(Debug, Clone)]
pub struct LineOfSight {
    pub points: Vec<LosPoint>,
    pub tangent_altitude: f64,
    /// `true` if the ray was clamped to `z = 0` at its last point rather
    /// than exiting to space.
    pub hit_surface: bool,
}

/// Trace a refractive ray from `observer`, initially pointed at
/// `view_point`, through `atm`.
///
/// `rayds` bounds the maximum segment length (km); when `refraction` is
/// enabled, the step is additionally shortened so the altitude change
/// per step never exceeds `raydz`, estimated from the previous step's
/// `dz/ds`. The ray terminates when it descends below `z = 0` (the
/// point is clamped to the surface and `hit_surface` is set), when it
/// climbs above the top of `atm` while still moving upward (exit to
/// space), or when `max_points` samples have been taken
/// ([`RaytraceError::TooManyPoints`], fatal).
pub fn trace(
    atm: &Atmosphere,
    observer: Vec3,
    view_point: Vec3,
    rayds: f64,
    raydz: f64,
    refraction: bool,
    max_points: usize,
) -> Result<LineOfSight, RaytraceError> {
    let initial_distance = observer.distance(&view_point);
    if initial_distance < 1e-9 {
        return Err(RaytraceError::DegenerateGeometry);
    }

    let top_altitude = *atm.z.last().ok_or(AtmosphereError::Empty)?;

    let mut position = observer;
    let mut direction = view_point.sub(&observer).scale(1.0 / initial_distance);
    let mut points = Vec::new();
    let mut path_length = 0.0;

    let mut prev_altitude: Option<f64> = None;
    let mut prev_step: Option<f64> = None;
    let mut n_prev: Option<f64> = None;
    let mut hit_surface = false;
    // Whether the ray has been at or below the top of `atm` at least
    // once. An observer starting above the atmosphere (the ordinary
    // satellite case) must not be mistaken for a ray already exiting to
    // space; only a ray that has entered the atmosphere and is now
    // climbing back out counts as "exit to space".
    let mut entered_atmosphere = false;

    loop {
        if points.len() >= max_points {
            warn!("line of sight exceeded the configured cap of {max_points} points");
            return Err(RaytraceError::TooManyPoints(max_points));
        }

        let geo = cart2geo(&position);
        let altitude = geo.alt;

        if altitude < 0.0 {
            let clamped = position.scale(crate::constants::RE / position.norm());
            points.push(LosPoint {
                position: clamped,
                altitude: 0.0,
                path_length,
            });
            hit_surface = true;
            break;
        }

        if altitude <= top_altitude {
            entered_atmosphere = true;
        }

        let moving_upward = prev_altitude.map(|pa| altitude >= pa).unwrap_or(false);
        if entered_atmosphere && altitude > top_altitude && moving_upward {
            points.push(LosPoint {
                position,
                altitude,
                path_length,
            });
            break;
        }

        points.push(LosPoint {
            position,
            altitude,
            path_length,
        });

        // Bend the direction toward regions of higher refractivity by
        // Snell's law in the local radial frame, comparing the
        // refractivity at this point against the previous one.
        let n_curr = if refraction {
            atm.interpolate(altitude)
                .ok()
                .map(|state| 1.0 + REFRAC * state.p / state.t)
        } else {
            None
        };
        if let (Some(np), Some(nc)) = (n_prev, n_curr) {
            let radial = position.scale(1.0 / position.norm());
            let d_radial = radial.scale(direction.dot(&radial));
            let d_tangential = direction.sub(&d_radial);
            let scaled_tangential = d_tangential.scale(np / nc);
            let bent = d_radial.add(&scaled_tangential);
            let bent_norm = bent.norm();
            if bent_norm > 1e-12 {
                direction = bent.scale(1.0 / bent_norm);
            }
        }
        if n_curr.is_some() {
            n_prev = n_curr;
        }

        // Adaptive step: shrink below `rayds` so the altitude change per
        // step respects `raydz`, using the previous step's observed
        // `dz/ds` as the estimate for this one.
        let step = if refraction {
            match (prev_altitude, prev_step) {
                (Some(pa), Some(ps)) if ps.abs() > 1e-9 => {
                    let dzds = (altitude - pa) / ps;
                    if dzds.abs() > 1e-9 {
                        rayds.min(raydz / dzds.abs())
                    } else {
                        rayds
                    }
                }
                _ => rayds,
            }
        } else {
            rayds
        };
        let step = step.max(1e-6);

        position = position.add(&direction.scale(step));
        path_length += step;
        prev_altitude = Some(altitude);
        prev_step = Some(step);
    }

    let tangent_altitude = points
        .iter()
        .map(|p| p.altitude)
        .fold(f64::MAX, f64::min);

    Ok(LineOfSight {
        points,
        tangent_altitude,
        hit_surface,
    })
}

/// Locate the tangent point (the line-of-sight point of minimum
/// altitude) of an already-traced line of sight.
pub fn tangent_point(los: &LineOfSight) -> Option<&LosPoint> {
    los.points
        .iter()
        .min_by(|a, b| a.altitude.partial_cmp(&b.altitude).unwrap())
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

    fn limb_geometry() -> (Vec3, Vec3) {
        // Observer at z=500km above the equator; view point is the exact
        // point where a straight line from the observer is tangent to
        // the z=20km sphere, so the non-refracting tangent altitude is
        // exactly 20 km.
        let re = crate::constants::RE;
        let r1 = re + 500.0;
        let rt = re + 20.0;
        let d = (r1 * r1 - rt * rt).sqrt();
        let observer = Vec3::new(r1, 0.0, 0.0);
        let view_point = Vec3::new(rt * rt / r1, rt * d / r1, 0.0);
        (observer, view_point)
    }

    #[test]
    fn trace_reaches_roughly_tangent_altitude() {
        let atm = sample_atm();
        let (observer, view_point) = limb_geometry();
        let los = trace(&atm, observer, view_point, 5.0, 2.0, false, 4096).unwrap();
        assert!(los.points.len() > 1);
        assert!((los.tangent_altitude - 20.0).abs() < 1.0);
    }

    #[test]
    fn refraction_shifts_tangent_altitude() {
        let atm = sample_atm();
        let (observer, view_point) = limb_geometry();
        let los_off = trace(&atm, observer, view_point, 5.0, 2.0, false, 4096).unwrap();
        let los_on = trace(&atm, observer, view_point, 5.0, 2.0, true, 4096).unwrap();
        assert!((los_off.tangent_altitude - los_on.tangent_altitude).abs() > 1e-6);
    }

    #[test]
    fn nadir_ray_hits_surface() {
        let atm = sample_atm();
        let re = crate::constants::RE;
        let observer = Vec3::new(0.0, 0.0, re + 500.0);
        let view_point = Vec3::new(0.0, 0.0, re + 400.0);
        let los = trace(&atm, observer, view_point, 5.0, 2.0, false, 4096).unwrap();
        assert!(los.hit_surface);
        let last = los.points.last().unwrap();
        assert!((last.altitude - 0.0).abs() < 1e-9);
    }

    #[test]
    fn upward_ray_exits_to_space() {
        let atm = sample_atm();
        let re = crate::constants::RE;
        let observer = Vec3::new(0.0, 0.0, re + 0.0);
        let view_point = Vec3::new(0.0, 0.0, re + 50.0);
        let los = trace(&atm, observer, view_point, 5.0, 2.0, false, 4096).unwrap();
        assert!(!los.hit_surface);
        assert!(los.points.last().unwrap().altitude >= 100.0);
    }

    #[test]
    fn trace_caps_at_max_points() {
        let atm = sample_atm();
        let (observer, view_point) = limb_geometry();
        let result = trace(&atm, observer, view_point, 5.0, 2.0, false, 3);
        assert!(matches!(result, Err(RaytraceError::TooManyPoints(3))));
    }

    #[test]
    fn degenerate_geometry_rejected() {
        let atm = sample_atm();
        let observer = Vec3::new(crate::constants::RE, 0.0, 0.0);
        assert!(matches!(
            trace(&atm, observer, observer, 5.0, 2.0, false, 4096),
            Err(RaytraceError::DegenerateGeometry)
        ));
    }

    #[test]
    fn tangent_point_is_minimum_altitude() {
        let atm = sample_atm();
        let (observer, view_point) = limb_geometry();
        let los = trace(&atm, observer, view_point, 5.0, 2.0, false, 4096).unwrap();
        let tp = tangent_point(&los).unwrap();
        assert!(los.points.iter().all(|p| p.altitude >= tp.altitude));
    }
}
