// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Packing and unpacking of the state vector (atmosphere quantities
//! selected for retrieval) and the measurement vector (observed
//! radiances), in the fixed quantity order mirrored from the original
//! implementation's index macros.

use crate::atmosphere::Atmosphere;

/// One retrievable or diagnosable atmospheric quantity, ordered exactly
/// as the original `IDXP`/`IDXT`/`IDXQ`/`IDXK`/`IDXCLZ`/`IDXCLDZ`/
/// `IDXCLK`/`IDXSFT`/`IDXSFEPS` index macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quantity {
    Pressure,
    Temperature,
    Vmr(usize),
    Extinction(usize),
    CloudTop,
    CloudDepth,
    CloudExtinction(usize),
    SurfaceTemperature,
    SurfaceEmissivity(usize),
}

/// One entry of the state vector: a quantity, and the profile level it
/// applies to (`None` for single-valued quantities like surface
/// temperature or cloud top).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTag {
    pub quantity: Quantity,
    pub profile_index: Option<usize>,
}

/// Pack the atmosphere quantities named by `tags` into a flat state
/// vector, in the order `tags` is given.
pub fn pack_state(atm: &Atmosphere, tags: &[StateTag]) -> Vec<f64> {
    tags.iter()
        .map(|tag| match (tag.quantity, tag.profile_index) {
            (Quantity::Pressure, Some(i)) => atm.p[i],
            (Quantity::Temperature, Some(i)) => atm.t[i],
            (Quantity::Vmr(g), Some(i)) => atm.q[g][i],
            (Quantity::Extinction(w), Some(i)) => atm.k[w][i],
            (Quantity::CloudTop, None) => atm.cloud.z_top,
            (Quantity::CloudDepth, None) => atm.cloud.delta_z,
            (Quantity::CloudExtinction(c), None) => atm.cloud.extinction[c],
            (Quantity::SurfaceTemperature, None) => atm.surface.temperature,
            (Quantity::SurfaceEmissivity(c), None) => atm.surface.emissivity[c],
            _ => panic!("state tag has inconsistent quantity/profile_index pairing"),
        })
        .collect()
}

/// Write a flat state vector back into `atm`, at the quantities and
/// profile levels named by `tags`, in the same order used by
/// [`pack_state`].
pub fn unpack_state(atm: &mut Atmosphere, tags: &[StateTag], x: &[f64]) {
    for (tag, &value) in tags.iter().zip(x) {
        match (tag.quantity, tag.profile_index) {
            (Quantity::Pressure, Some(i)) => atm.p[i] = value,
            (Quantity::Temperature, Some(i)) => atm.t[i] = value,
            (Quantity::Vmr(g), Some(i)) => atm.q[g][i] = value,
            (Quantity::Extinction(w), Some(i)) => atm.k[w][i] = value,
            (Quantity::CloudTop, None) => atm.cloud.z_top = value,
            (Quantity::CloudDepth, None) => atm.cloud.delta_z = value,
            (Quantity::CloudExtinction(c), None) => atm.cloud.extinction[c] = value,
            (Quantity::SurfaceTemperature, None) => atm.surface.temperature = value,
            (Quantity::SurfaceEmissivity(c), None) => atm.surface.emissivity[c] = value,
            _ => panic!("state tag has inconsistent quantity/profile_index pairing"),
        }
    }
}

/// Pack per-ray, per-channel radiances (`radiances[ray][channel]`) into a
/// flat measurement vector in row-major order with channel the slow index
/// and ray the fast index: `y[d * num_rays + r] = radiances[r][d]`.
pub fn pack_obs(radiances: &[Vec<f64>]) -> Vec<f64> {
    let num_rays = radiances.len();
    let num_channels = radiances.first().map(|r| r.len()).unwrap_or(0);
    let mut y = Vec::with_capacity(num_rays * num_channels);
    for d in 0..num_channels {
        for ray in radiances {
            y.push(ray[d]);
        }
    }
    y
}

/// Inverse of [`pack_obs`]: unpack a flat, channel-slower/ray-faster
/// measurement vector back into per-ray, per-channel radiances.
pub fn unpack_obs(y: &[f64], num_rays: usize) -> Vec<Vec<f64>> {
    if num_rays == 0 {
        return Vec::new();
    }
    let num_channels = y.len() / num_rays;
    let mut radiances = vec![vec![0.0; num_channels]; num_rays];
    for d in 0..num_channels {
        for r in 0..num_rays {
            radiances[r][d] = y[d * num_rays + r];
        }
    }
    radiances
}
