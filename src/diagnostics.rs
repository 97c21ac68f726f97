// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diagnostic utilities: relative-error statistics between two
//! observation sets, per-emitter contribution breakdowns, and counters
//! for silent physical-bound clamping (§7 category 5 in the expanded
//! specification).

use crate::absorber::ForwardModel;
use crate::atmosphere::{Atmosphere, CloudParams};
use crate::continuum::ContinuumSet;
use crate::los::compute_optical_quantities;
use crate::lut::LutStore;
use crate::raytrace::{trace, LineOfSight};
use crate::rt::{cosmic_background_radiance, integrate, RtError};

/// Counts of silent clamps applied to out-of-range physical quantities.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampCounters {
    /// Number of times `u_at` was asked to invert an emissivity outside
    /// the tabulated range and clamped to an axis endpoint.
    pub u_at_out_of_range: usize,
}

/// Per-channel mean, standard deviation, minimum, and maximum relative
/// error between a reference and a test observation set.
#[derive(Debug, Clone, Copy)]
pub struct RelativeErrorStats {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Relative-error statistics per channel between `reference` and `test`
/// observation sets, each `[observation][channel]`. Returns `None` for a
/// channel with no reference samples, rather than dividing by zero.
pub fn relative_error_stats(
    reference: &[Vec<f64>],
    test: &[Vec<f64>],
) -> Vec<Option<RelativeErrorStats>> {
    let num_channels = reference.first().map(|r| r.len()).unwrap_or(0);
    (0..num_channels)
        .map(|channel| {
            let errors: Vec<f64> = reference
                .iter()
                .zip(test)
                .filter_map(|(r, t)| {
                    let ref_val = *r.get(channel)?;
                    let test_val = *t.get(channel)?;
                    if ref_val == 0.0 {
                        return None;
                    }
                    Some((test_val - ref_val) / ref_val)
                })
                .collect();

            if errors.is_empty() {
                return None;
            }

            let n = errors.len() as f64;
            let mean = errors.iter().sum::<f64>() / n;
            let variance = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
            let min = errors.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = errors.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some(RelativeErrorStats {
                mean,
                stddev: variance.sqrt(),
                min,
                max,
            })
        })
        .collect()
}

/// Run the forward model with every gas but `gas_index` zeroed out and
/// continua disabled, isolating that gas's contribution to the
/// radiance on each channel.
pub fn per_emitter_contribution(
    atm: &Atmosphere,
    lut: &LutStore,
    channel_wavenumbers: &[f64],
    window: &[usize],
    gas_index: usize,
    forward_model: &ForwardModel,
    los: &LineOfSight,
) -> Result<Vec<f64>, RtError> {
    let mut isolated = atm.clone();
    for (g, profile) in isolated.q.iter_mut().enumerate() {
        if g != gas_index {
            profile.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    let path = compute_optical_quantities(los, &isolated, channel_wavenumbers, window, ContinuumSet::NONE, None, None);
    let boundaries: Vec<f64> = channel_wavenumbers
        .iter()
        .map(|&nu| cosmic_background_radiance(nu))
        .collect();
    integrate(&path, lut, channel_wavenumbers, forward_model, &boundaries, &CloudParams::default())
}

/// Trace a line of sight for use by diagnostic helpers that need one but
/// don't otherwise own the geometry (a thin convenience re-export so
/// callers don't need to depend on `raytrace` directly for this).
pub fn trace_for_diagnostics(
    atm: &Atmosphere,
    observer: crate::geodesy::Vec3,
    view_point: crate::geodesy::Vec3,
    rayds: f64,
    raydz: f64,
    refraction: bool,
    max_points: usize,
) -> Result<LineOfSight, crate::raytrace::RaytraceError> {
    trace(atm, observer, view_point, rayds, raydz, refraction, max_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_error_stats_basic() {
        let reference = vec![vec![1.0, 2.0], vec![1.0, 2.0]];
        let test = vec![vec![1.1, 2.0], vec![0.9, 2.2]];
        let stats = relative_error_stats(&reference, &test);
        assert_eq!(stats.len(), 2);
        let ch0 = stats[0].unwrap();
        assert!((ch0.mean).abs() < 0.2);
    }

    #[test]
    fn relative_error_stats_none_when_no_reference_samples() {
        let reference: Vec<Vec<f64>> = vec![];
        let test: Vec<Vec<f64>> = vec![];
        let stats = relative_error_stats(&reference, &test);
        assert!(stats.is_empty());
    }

    #[test]
    fn relative_error_stats_skips_zero_reference_value() {
        let reference = vec![vec![0.0]];
        let test = vec![vec![5.0]];
        let stats = relative_error_stats(&reference, &test);
        assert!(stats[0].is_none());
    }
}
