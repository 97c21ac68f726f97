// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Forward-model orchestration: the single entry point that composes
//! ray tracing, line-of-sight optics, the absorber model, RT
//! integration, surface boundary handling and field-of-view
//! convolution into one per-ray radiance calculation, and writes the
//! result back onto the observation the way the kernel assembler and
//! retrieval loop expect.
//!
//! The ray loop below is the data-parallel operation named in the
//! expanded specification's concurrency model: each ray's trace, LOS
//! construction, and integration touch only read-only shared state
//! (the atmosphere and LUT) plus thread-local scratch, so rays are run
//! with `rayon`'s `par_iter_mut`, mirroring the column-parallel kernel
//! assembler in `kernel.rs`.

use rayon::prelude::*;

use crate::absorber::ForwardModel;
use crate::atmosphere::Atmosphere;
use crate::control::{ControlParams, SurfaceMode};
use crate::fov;
use crate::geodesy::{cart2geo, geo2cart, GeoPoint};
use crate::los::compute_optical_quantities;
use crate::lut::LutStore;
use crate::observation::{Observation, Observations};
use crate::raytrace::{tangent_point, trace, LineOfSight};
use crate::rt::{cosmic_background_radiance, integrate, path_transmittance, write_bbt, RtError};
use crate::source::planck;

/// Brightness temperature of the solar disc used for the reflected-solar
/// boundary term ([`SurfaceMode::Solar`]), K.
const SOLAR_BRIGHTNESS_TEMP: f64 = 5778.0;

/// The solar disc's solid angle as seen from Earth, divided by 2*pi sr,
/// used to scale the solar Planck radiance down to the irradiance
/// incident on a horizontal surface.
const SOLAR_SOLID_ANGLE_FRACTION: f64 = 3.4e-5;

/// Run the forward model for every ray in `observations`, writing
/// `tau`/`rad` back onto each [`Observation`]. Rays are independent:
/// writes are partitioned by ray index, so no synchronisation is
/// needed beyond `rayon`'s join/fork.
pub fn run_observations(
    ctl: &ControlParams,
    lut: &LutStore,
    atm: &Atmosphere,
    forward_model: &ForwardModel,
    observations: &mut Observations,
) -> Result<(), RtError> {
    observations
        .rays
        .par_iter_mut()
        .try_for_each(|obs| run_ray(ctl, lut, atm, forward_model, obs))
}

/// Run the forward model for one ray, writing `tau`/`rad` onto `obs`.
///
/// `tau` is always taken from the nominal (un-offset) line of sight.
/// `rad` is the field-of-view convolution of the nominal line of sight
/// with its `NFOV` vertical neighbours when `ctl.fov_half_width_km` is
/// set, else the nominal radiance alone.
pub fn run_ray(
    ctl: &ControlParams,
    lut: &LutStore,
    atm: &Atmosphere,
    forward_model: &ForwardModel,
    obs: &mut Observation,
) -> Result<(), RtError> {
    let (nominal_tau, nominal_rad) = trace_and_integrate(ctl, lut, atm, forward_model, obs, 0.0)?;

    let rad = match ctl.fov_half_width_km {
        Some(half_width) => fov::convolve(half_width, |offset_km| {
            if offset_km == 0.0 {
                Ok(nominal_rad.clone())
            } else {
                trace_and_integrate(ctl, lut, atm, forward_model, obs, offset_km).map(|(_, r)| r)
            }
        })?,
        None => nominal_rad,
    };

    obs.tau = nominal_tau;
    obs.rad = rad;
    Ok(())
}

/// Trace `obs`'s line of sight offset vertically by `altitude_offset_km`
/// at the view point (used by FOV sampling), record the tangent point
/// on the first, un-offset call, compute per-segment optics, then
/// integrate every channel. Returns `(tau, rad)` per channel.
fn trace_and_integrate(
    ctl: &ControlParams,
    lut: &LutStore,
    atm: &Atmosphere,
    forward_model: &ForwardModel,
    obs: &Observation,
    altitude_offset_km: f64,
) -> Result<(Vec<f64>, Vec<f64>), RtError> {
    let mut view_point = obs.view_point;
    view_point.alt += altitude_offset_km;

    let observer_cart = geo2cart(&obs.observer);
    let view_cart = geo2cart(&view_point);
    let los = trace(
        atm,
        observer_cart,
        view_cart,
        ctl.rayds,
        ctl.raydz,
        ctl.refraction,
        ctl.max_los_points,
    )?;

    let path = compute_optical_quantities(&los, atm, &ctl.channel_wavenumbers, &ctl.window, ctl.continua, ctl.co2_gas_index, ctl.h2o_gas_index);

    let tau = path_transmittance(&path, lut, &ctl.channel_wavenumbers, forward_model)?;

    // `boundary`/`integrate` carry one entry per channel in
    // `ctl.channel_wavenumbers`, matching `path`'s per-segment arrays, so
    // every channel's LUT/continuum/aerosol/source lookup lands on its own
    // global channel index rather than aliasing to channel 0.
    let boundary = boundary_radiance(ctl, lut, atm, forward_model, &los, &ctl.channel_wavenumbers)?;
    let rad = integrate(&path, lut, &ctl.channel_wavenumbers, forward_model, &boundary, &atm.cloud)?;

    Ok((tau, rad))
}

/// The boundary radiance feeding [`integrate`]'s far-end accumulator, one
/// entry per channel: deep space (optionally attenuated to a cosmic
/// background), or, for a surface-terminated ray, the emitted-plus-reflected
/// surface term selected by `ctl.surface_mode`.
fn boundary_radiance(
    ctl: &ControlParams,
    lut: &LutStore,
    atm: &Atmosphere,
    forward_model: &ForwardModel,
    los: &LineOfSight,
    channel_wavenumbers: &[f64],
) -> Result<Vec<f64>, RtError> {
    if !los.hit_surface || ctl.surface_mode == SurfaceMode::None {
        return Ok(channel_wavenumbers.iter().map(|&nu| cosmic_background_radiance(nu)).collect());
    }

    let num_channels = channel_wavenumbers.len();
    let emissivity_at = |channel: usize| atm.surface.emissivity.get(channel).copied().unwrap_or(1.0).clamp(0.0, 1.0);
    let emitted: Vec<f64> = (0..num_channels)
        .map(|channel| emissivity_at(channel) * planck(channel_wavenumbers[channel], atm.surface.temperature))
        .collect();

    if matches!(ctl.surface_mode, SurfaceMode::Emissions) {
        return Ok(emitted);
    }

    let surface_point = los.points.last().ok_or(RtError::EmptyPath)?;
    let downward_boundary: Vec<f64> = channel_wavenumbers
        .iter()
        .map(|&nu| match ctl.surface_mode {
            SurfaceMode::Solar => planck(nu, SOLAR_BRIGHTNESS_TEMP) * SOLAR_SOLID_ANGLE_FRACTION,
            _ => cosmic_background_radiance(nu),
        })
        .collect();
    let l_downward = downward_radiance(
        ctl,
        lut,
        atm,
        forward_model,
        surface_point,
        channel_wavenumbers,
        &downward_boundary,
    )?;

    Ok((0..num_channels)
        .map(|channel| {
            let reflected_weight = 1.0 - emissivity_at(channel);
            emitted[channel] + reflected_weight.max(0.0) * l_downward[channel]
        })
        .collect())
}

/// A second RT integration, from the surface point straight up to the
/// top of the atmosphere, used as the downward-radiance term for
/// [`SurfaceMode::Downward`] and [`SurfaceMode::Solar`]. Traces the
/// upward geometry once (it does not depend on channel) and integrates
/// every channel together so the LUT/continuum/aerosol lookups inside
/// [`integrate`] see the same global channel indices as the main pass.
fn downward_radiance(
    ctl: &ControlParams,
    lut: &LutStore,
    atm: &Atmosphere,
    forward_model: &ForwardModel,
    surface_point: &crate::raytrace::LosPoint,
    channel_wavenumbers: &[f64],
    boundary: &[f64],
) -> Result<Vec<f64>, RtError> {
    let surface_geo = cart2geo(&surface_point.position);
    let top_altitude = *atm.z.last().unwrap_or(&0.0);
    let zenith_view = GeoPoint {
        lon: surface_geo.lon,
        lat: surface_geo.lat,
        alt: top_altitude,
    };

    let los_up = trace(
        atm,
        surface_point.position,
        geo2cart(&zenith_view),
        ctl.rayds,
        ctl.raydz,
        ctl.refraction,
        ctl.max_los_points,
    )?;
    let path_up = compute_optical_quantities(&los_up, atm, channel_wavenumbers, &ctl.window, ctl.continua, ctl.co2_gas_index, ctl.h2o_gas_index);
    integrate(&path_up, lut, channel_wavenumbers, forward_model, boundary, &atm.cloud)
}

/// Brightness-temperature view of a fully integrated observation set,
/// computed only at this output stage so retrieval and error analysis
/// stay in linear radiance space (`spec.md` 4.9: "Brightness temperature
/// conversion is done only at the final output stage").
pub fn observations_to_bbt(ctl: &ControlParams, observations: &Observations) -> Vec<Vec<f64>> {
    observations
        .rays
        .iter()
        .map(|obs| write_bbt(&ctl.channel_wavenumbers, &obs.rad))
        .collect()
}

/// Re-trace `obs` and write its tangent point, without running the
/// radiative-transfer integration. Useful for callers (e.g. the kernel
/// assembler's altitude-window pruning) that only need ray geometry.
pub fn refresh_tangent_point(obs: &mut Observation, atm: &Atmosphere, ctl: &ControlParams) -> Result<(), RtError> {
    let los = trace(
        atm,
        geo2cart(&obs.observer),
        geo2cart(&obs.view_point),
        ctl.rayds,
        ctl.raydz,
        ctl.refraction,
        ctl.max_los_points,
    )?;
    obs.tangent = tangent_point(&los).map(|p| cart2geo(&p.position));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{CloudParams, SurfaceParams};
    use crate::control::ForwardModelKind;
    use crate::continuum::ContinuumSet;
    use hifitime::Epoch;

    fn transparent_atm() -> Atmosphere {
        Atmosphere {
            z: vec![0.0, 10.0, 20.0, 50.0, 100.0],
            p: vec![1013.25, 265.0, 55.0, 0.8, 0.0003],
            t: vec![288.0, 223.0, 217.0, 270.0, 195.0],
            q: vec![vec![0.0, 0.0, 0.0, 0.0, 0.0]],
            k: vec![],
            cloud: CloudParams::default(),
            surface: SurfaceParams::default(),
        }
    }

    fn sample_ctl(surface_mode: SurfaceMode, fov_half_width_km: Option<f64>) -> ControlParams {
        ControlParams {
            channel_wavenumbers: vec![700.0],
            window: vec![0],
            gases: vec!["CO2".to_string()],
            continua: ContinuumSet::NONE,
            co2_gas_index: Some(0),
            h2o_gas_index: None,
            n2_gas_index: None,
            o2_gas_index: None,
            surface_mode,
            refraction: false,
            rayds: 5.0,
            raydz: 2.0,
            forward_model: ForwardModelKind::Cga,
            max_los_points: 4096,
            max_iterations: 10,
            initial_lambda: 1e-3,
            convergence_threshold: 1e-4,
            fov_half_width_km,
        }
    }

    fn nadir_obs() -> Observation {
        Observation::new(
            Epoch::from_gpst_seconds(1_000_000_000.0),
            GeoPoint {
                lon: 0.0,
                lat: 0.0,
                alt: 700.0,
            },
            GeoPoint {
                lon: 0.0,
                lat: 0.0,
                alt: 0.0,
            },
        )
    }

    #[test]
    fn transparent_atmosphere_with_surface_off_gives_zero_radiance() {
        let atm = transparent_atm();
        let ctl = sample_ctl(SurfaceMode::None, None);
        let lut = LutStore::new(1, 1);
        let mut obs = nadir_obs();
        run_ray(&ctl, &lut, &atm, &ForwardModel::Cga, &mut obs).unwrap();
        assert!((obs.rad[0]).abs() < 1e-12);
    }

    #[test]
    fn blackbody_surface_matches_planck_law() {
        let mut atm = transparent_atm();
        atm.surface = SurfaceParams {
            temperature: 288.0,
            emissivity: vec![1.0],
        };
        let ctl = sample_ctl(SurfaceMode::Emissions, None);
        let lut = LutStore::new(1, 1);
        let mut obs = nadir_obs();
        run_ray(&ctl, &lut, &atm, &ForwardModel::Cga, &mut obs).unwrap();
        let expected = planck(700.0, 288.0);
        assert!(
            (obs.rad[0] - expected).abs() / expected < 1e-6,
            "rad={} expected={}",
            obs.rad[0],
            expected
        );
    }

    #[test]
    fn fov_convolution_of_identical_rays_matches_unconvolved_radiance() {
        let mut atm = transparent_atm();
        atm.surface = SurfaceParams {
            temperature: 288.0,
            emissivity: vec![1.0],
        };
        let ctl_plain = sample_ctl(SurfaceMode::Emissions, None);
        let ctl_fov = sample_ctl(SurfaceMode::Emissions, Some(0.0));
        let lut = LutStore::new(1, 1);

        let mut plain = nadir_obs();
        run_ray(&ctl_plain, &lut, &atm, &ForwardModel::Cga, &mut plain).unwrap();

        let mut convolved = nadir_obs();
        run_ray(&ctl_fov, &lut, &atm, &ForwardModel::Cga, &mut convolved).unwrap();

        assert!((plain.rad[0] - convolved.rad[0]).abs() < 1e-9);
    }

    #[test]
    fn run_observations_fills_every_ray() {
        let atm = transparent_atm();
        let ctl = sample_ctl(SurfaceMode::None, None);
        let lut = LutStore::new(1, 1);
        let mut observations = Observations {
            rays: vec![nadir_obs(), nadir_obs()],
        };
        run_observations(&ctl, &lut, &atm, &ForwardModel::Cga, &mut observations).unwrap();
        assert_eq!(observations.rays.len(), 2);
        for ray in &observations.rays {
            assert_eq!(ray.rad.len(), 1);
            assert_eq!(ray.tau.len(), 1);
        }
    }
}
