// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Planck source function and per-segment emission, blended with cloud
//! emission where a segment falls inside a cloud layer.

use crate::atmosphere::CloudParams;
use crate::constants::{C1, C2};
use crate::los::Segment;
use crate::lut::LutStore;

/// Planck spectral radiance at wavenumber `nu` (cm^-1) and temperature
/// `t` (K), in W / (m^2 sr cm^-1).
pub fn planck(nu: f64, t: f64) -> f64 {
    C1 * nu.powi(3) / ((C2 * nu / t).exp() - 1.0)
}

/// Brightness temperature corresponding to radiance `radiance` at
/// wavenumber `nu`, the inverse of [`planck`].
pub fn brightness_temp(nu: f64, radiance: f64) -> f64 {
    if radiance <= 0.0 {
        return 0.0;
    }
    C2 * nu / (1.0 + C1 * nu.powi(3) / radiance).ln()
}

/// Source radiance of one line-of-sight segment on `channel`, read from
/// the lookup table's dense source-function grid (falling back to a
/// direct Planck evaluation if the table hasn't been built), blended
/// with cloud emission when the segment's altitude range overlaps the
/// cloud layer.
pub fn segment_source(
    lut: &LutStore,
    segment: &Segment,
    channel: usize,
    channel_wavenumber: f64,
    cloud: &CloudParams,
    segment_in_cloud: bool,
) -> f64 {
    let clear_air = lut.source(channel, channel_wavenumber, segment.mean_t);
    if !segment_in_cloud || cloud.extinction.is_empty() {
        return clear_air;
    }
    let cloud_temp = segment.mean_t;
    let cloud_radiance = lut.source(channel, channel_wavenumber, cloud_temp);
    let cloud_opacity = (1.0 - (-cloud.delta_z).exp()).clamp(0.0, 1.0);
    cloud_opacity * cloud_radiance + (1.0 - cloud_opacity) * clear_air
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn planck_round_trips_through_brightness_temp() {
        let nu = 667.0;
        let t = 250.0;
        let radiance = planck(nu, t);
        let recovered = brightness_temp(nu, radiance);
        assert_abs_diff_eq!(recovered, t, epsilon = 1e-6);
    }

    #[test]
    fn planck_increases_with_temperature() {
        assert!(planck(667.0, 300.0) > planck(667.0, 200.0));
    }

    #[test]
    fn brightness_temp_of_non_positive_radiance_is_zero() {
        assert_abs_diff_eq!(brightness_temp(667.0, 0.0), 0.0);
        assert_abs_diff_eq!(brightness_temp(667.0, -1.0), 0.0);
    }
}
