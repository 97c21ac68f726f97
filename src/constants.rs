// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Physical constants and fixed dimension limits used throughout the crate.

/// First radiation constant for spectral radiance, W / (m^2 sr cm^-4).
pub const C1: f64 = 1.191_042_59e-8;

/// Second radiation constant, K cm.
pub const C2: f64 = 1.438_775_06;

/// Boltzmann constant, J/K.
pub const KB: f64 = 1.380_650_4e-23;

/// Standard gravity at the geoid, m/s^2.
pub const G0: f64 = 9.806_16;

/// Mean radius of the Earth, km.
pub const RE: f64 = 6367.421;

/// Ideal gas constant, J/(mol K).
pub const RI: f64 = 8.314_47;

/// Molar fraction of N2 in dry air.
pub const N2: f64 = 0.781_9;

/// Molar fraction of O2 in dry air.
pub const O2: f64 = 0.209_35;

/// Lower bound on a Curtis-Godson column amount, molecules/cm^2.
pub const UMIN: f64 = 0.0;

/// Upper bound on a Curtis-Godson column amount, molecules/cm^2.
pub const UMAX: f64 = 1e30;

/// Lower bound on a physically valid temperature, K.
pub const TMIN: f64 = 100.0;

/// Upper bound on a physically valid temperature, K.
pub const TMAX: f64 = 400.0;

/// Lower bound on a physically valid pressure, hPa.
pub const PMIN: f64 = 5e-7;

/// Upper bound on a physically valid pressure, hPa.
pub const PMAX: f64 = 5e4;

/// Lower bound on cloud-layer depth, km.
pub const CLOUD_DEPTH_MIN: f64 = 0.1;

/// Refractivity coefficient: n - 1 = REFRAC * p / T, with p in hPa, T in K.
pub const REFRAC: f64 = 7.753e-5;

/// Default cap on the number of points in a single line of sight.
pub const NLOS: usize = 4096;

/// Number of rays used for field-of-view convolution.
pub const NFOV: usize = 5;

/// Default cap on tabulated pressure levels in a single LUT.
pub const TBLNP: usize = 40;

/// Default cap on tabulated temperatures at a single pressure level.
pub const TBLNT: usize = 30;

/// Default cap on tabulated column amounts at a single temperature.
pub const TBLNU: usize = 40;

/// Default number of uniformly spaced temperatures in the dense
/// Planck source-function table.
pub const TBLNS: usize = 100;
