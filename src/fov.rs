// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Field-of-view convolution: weighted averaging of the forward model's
//! output over a small set of rays sampling the instrument's angular
//! response.

use crate::constants::NFOV;
use crate::rt::{PerChannel, RtError};

/// Vertical offsets (a fraction of the FOV half-width) and weights for a
/// symmetric `NFOV`-point triangular field-of-view response.
fn fov_samples() -> [(f64, f64); NFOV] {
    [
        (-1.0, 0.1),
        (-0.5, 0.25),
        (0.0, 0.3),
        (0.5, 0.25),
        (1.0, 0.1),
    ]
}

/// Convolve the forward model over the field of view: `trace_and_integrate`
/// re-traces and integrates the forward model at a given vertical offset
/// (km) from the nominal line of sight, returning per-channel radiance.
pub fn convolve(
    fov_half_width_km: f64,
    mut trace_and_integrate: impl FnMut(f64) -> Result<PerChannel<f64>, RtError>,
) -> Result<PerChannel<f64>, RtError> {
    let samples = fov_samples();
    let mut accum: Option<Vec<f64>> = None;
    let mut weight_sum = 0.0;

    for (offset_frac, weight) in samples {
        let offset_km = offset_frac * fov_half_width_km;
        let radiance = trace_and_integrate(offset_km)?;
        weight_sum += weight;
        match &mut accum {
            Some(acc) => {
                for (a, r) in acc.iter_mut().zip(&radiance) {
                    *a += weight * r;
                }
            }
            None => accum = Some(radiance.iter().map(|r| weight * r).collect()),
        }
    }

    let mut result = accum.ok_or(RtError::EmptyPath)?;
    for v in result.iter_mut() {
        *v /= weight_sum;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convolve_averages_constant_radiance() {
        let result = convolve(1.0, |_offset| Ok(vec![5.0, 7.0])).unwrap();
        assert!((result[0] - 5.0).abs() < 1e-9);
        assert!((result[1] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn convolve_samples_five_offsets() {
        let mut offsets = Vec::new();
        let _ = convolve(2.0, |offset| {
            offsets.push(offset);
            Ok(vec![1.0])
        });
        assert_eq!(offsets.len(), NFOV);
    }
}
