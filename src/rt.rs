// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Radiative transfer integration along a line of sight, and output
//! conversion to brightness temperature.

use thiserror::Error;

use crate::absorber::ForwardModel;
use crate::atmosphere::CloudParams;
use crate::diagnostics::ClampCounters;
use crate::los::OpticalPath;
use crate::lut::LutStore;
use crate::source::{brightness_temp, planck, segment_source};

/// Per-channel values, e.g. radiance or brightness temperature.
pub type PerChannel<T> = Vec<T>;

/// Errors from RT integration.
#[derive(Error, Debug)]
pub enum RtError {
    #[error("optical path has no segments")]
    EmptyPath,

    #[error("channel index {0} is out of range")]
    BadChannel(usize),

    #[error(transparent)]
    Raytrace(#[from] crate::raytrace::RaytraceError),
}

/// Integrate radiance for every channel along `path`, from the deep-space
/// boundary (the far end of the traced line of sight) to the observer
/// (the near end), accumulating emission attenuated by everything between
/// a segment and the observer.
///
/// `channel_wavenumbers` and `boundary` must each have one entry per
/// channel carried by `path`'s per-segment arrays (`segment.continuum`,
/// `segment.aerosol`) and by `lut`/`cloud`'s per-channel tables; `channel`
/// is used as a single global index into all of them, so callers must
/// never slice `path`/`lut`/`cloud` down to fewer channels than they pass
/// here.
pub fn integrate(
    path: &OpticalPath,
    lut: &LutStore,
    channel_wavenumbers: &[f64],
    forward_model: &ForwardModel,
    boundary: &[f64],
    cloud: &CloudParams,
) -> Result<PerChannel<f64>, RtError> {
    if path.segments.is_empty() {
        return Err(RtError::EmptyPath);
    }
    let num_channels = channel_wavenumbers.len();
    let num_gases = path.segments[0].gases.len();

    let mut radiance = boundary.to_vec();
    radiance.resize(num_channels, 0.0);
    let mut clamps = ClampCounters::default();

    for channel in 0..num_channels {
        let mut gas_state = forward_model.init_state(num_gases);
        // Segments are ordered observer -> far point; integrate far-to-near.
        for segment in path.segments.iter().rev() {
            let transmittance = forward_model.segment_transmittance(
                lut,
                segment,
                channel,
                &mut gas_state,
                &mut clamps,
            );
            let segment_in_cloud = cloud.delta_z > 0.0
                && segment.mean_p > 0.0
                && !cloud.extinction.is_empty()
                && channel < cloud.extinction.len()
                && cloud.extinction[channel] > 0.0;
            let emitted = segment_source(
                lut,
                segment,
                channel,
                channel_wavenumbers[channel],
                cloud,
                segment_in_cloud,
            );
            radiance[channel] = radiance[channel] * transmittance + emitted * (1.0 - transmittance);
        }
    }

    Ok(radiance)
}

/// Cumulative path transmittance per channel: the product, over every
/// segment of `path`, of [`ForwardModel::segment_transmittance`] (gas
/// absorption plus continuum and aerosol attenuation) — `tau[d]`
/// alongside `rad[d]` in the forward-model output contract. Walked
/// independently of [`integrate`] so retrieval/diagnostics code that
/// only needs radiance is not forced to pay for it.
pub fn path_transmittance(
    path: &OpticalPath,
    lut: &LutStore,
    channel_wavenumbers: &[f64],
    forward_model: &ForwardModel,
) -> Result<PerChannel<f64>, RtError> {
    if path.segments.is_empty() {
        return Err(RtError::EmptyPath);
    }
    let num_gases = path.segments[0].gases.len();
    let mut clamps = ClampCounters::default();

    let tau = (0..channel_wavenumbers.len())
        .map(|channel| {
            let mut gas_state = forward_model.init_state(num_gases);
            path.segments.iter().rev().fold(1.0, |tau, segment| {
                tau * forward_model.segment_transmittance(lut, segment, channel, &mut gas_state, &mut clamps)
            })
        })
        .collect();
    Ok(tau)
}

/// Convert per-channel radiance to brightness temperature. Kept as an
/// explicit post-processing step, never fused into [`integrate`], so
/// retrieval and error-analysis code can stay in linear radiance space.
pub fn write_bbt(channel_wavenumbers: &[f64], radiance: &[f64]) -> PerChannel<f64> {
    channel_wavenumbers
        .iter()
        .zip(radiance)
        .map(|(&nu, &r)| brightness_temp(nu, r))
        .collect()
}

/// Cosmic-background radiance at `nu`, used as the deep-space boundary
/// condition for limb-viewing geometries.
pub fn cosmic_background_radiance(nu: f64) -> f64 {
    planck(nu, 2.725)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::los::{Segment, SegmentGas};

    fn sample_path() -> OpticalPath {
        let seg = |u: f64, t: f64| Segment {
            path_length_cm: 1e5,
            mean_p: 50.0,
            mean_t: t,
            gases: vec![SegmentGas {
                u,
                cg_u: u,
                cg_p: 50.0,
                cg_t: t,
            }],
            continuum: vec![0.01],
            aerosol: vec![0.0],
        };
        OpticalPath {
            segments: vec![seg(0.5, 220.0), seg(0.5, 240.0), seg(0.5, 260.0)],
        }
    }

    #[test]
    fn integrate_returns_one_value_per_channel() {
        let lut = LutStore::new(1, 1);
        let path = sample_path();
        let radiance = integrate(
            &path,
            &lut,
            &[667.0],
            &ForwardModel::Cga,
            &[cosmic_background_radiance(667.0)],
            &CloudParams::default(),
        )
        .unwrap();
        assert_eq!(radiance.len(), 1);
        assert!(radiance[0] > 0.0);
    }

    #[test]
    fn path_transmittance_is_in_unit_interval_and_matches_continuum_only_when_gas_tables_absent() {
        let lut = LutStore::new(1, 1);
        let path = sample_path();
        // No LUT tables loaded: every gas is transparent, so tau is
        // exactly the continuum/aerosol attenuation, exp(-sum(tau_continuum)).
        let tau = path_transmittance(&path, &lut, &[667.0], &ForwardModel::Cga).unwrap();
        assert_eq!(tau.len(), 1);
        let expected: f64 = path.segments.iter().map(|s| (-s.continuum[0]).exp()).product();
        assert!((tau[0] - expected).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&tau[0]));
    }

    #[test]
    fn empty_path_errors() {
        let lut = LutStore::new(1, 1);
        let path = OpticalPath::default();
        assert!(matches!(
            integrate(
                &path,
                &lut,
                &[667.0],
                &ForwardModel::Cga,
                &[0.0],
                &CloudParams::default()
            ),
            Err(RtError::EmptyPath)
        ));
    }

    #[test]
    fn write_bbt_is_monotonic_in_radiance() {
        let bbt = write_bbt(&[667.0, 667.0], &[1e-8, 1e-7]);
        assert!(bbt[1] > bbt[0]);
    }
}
