// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Atmosphere profile (`atm_t`): altitude-ordered pressure/temperature/
//! volume-mixing-ratio grid plus single-valued cloud and surface fields,
//! and the interpolation and hydrostatic-balance operations on it.

use thiserror::Error;

use crate::constants::{G0, N2, O2, RI};
use crate::interp::locate_irr;

/// Errors from atmosphere construction, interpolation, or hydrostatic
/// balancing.
#[derive(Error, Debug)]
pub enum AtmosphereError {
    #[error("atmosphere has no profile points")]
    Empty,

    #[error("profile arrays have mismatched lengths: z={z}, p={p}, t={t}")]
    LengthMismatch { z: usize, p: usize, t: usize },

    #[error("gas volume mixing ratio profile {0} has the wrong length")]
    GasLengthMismatch(usize),

    #[error("reference altitude {0} was not found in the profile")]
    NoReferenceLevel(f64),
}

/// Cloud parameters: a single cloud layer with per-channel extinction.
#[derive(Debug, Clone, Default)]
pub struct CloudParams {
    /// Cloud top altitude, km.
    pub z_top: f64,
    /// Cloud geometric thickness, km.
    pub delta_z: f64,
    /// Per-channel cloud extinction coefficient, km^-1.
    pub extinction: Vec<f64>,
}

/// Surface parameters: temperature and per-channel emissivity.
#[derive(Debug, Clone, Default)]
pub struct SurfaceParams {
    pub temperature: f64,
    pub emissivity: Vec<f64>,
}

/// An atmospheric profile: altitude-ascending pressure/temperature/VMR
/// grid, plus single-valued cloud and surface fields.
#[derive(Debug, Clone)]
pub struct Atmosphere {
    /// Altitude levels, km, strictly ascending.
    pub z: Vec<f64>,
    /// Pressure, hPa.
    pub p: Vec<f64>,
    /// Temperature, K.
    pub t: Vec<f64>,
    /// Volume mixing ratio profiles, one per gas, each the same length as `z`.
    pub q: Vec<Vec<f64>>,
    /// Extinction profiles, one per extinction window, each the same length as `z`.
    pub k: Vec<Vec<f64>>,
    pub cloud: CloudParams,
    pub surface: SurfaceParams,
}

/// The interpolated atmospheric state at a single altitude.
#[derive(Debug, Clone)]
pub struct AtmosphereState {
    pub p: f64,
    pub t: f64,
    pub q: Vec<f64>,
    pub k: Vec<f64>,
}

impl Atmosphere {
    pub fn validate(&self) -> Result<(), AtmosphereError> {
        if self.z.is_empty() {
            return Err(AtmosphereError::Empty);
        }
        if self.p.len() != self.z.len() || self.t.len() != self.z.len() {
            return Err(AtmosphereError::LengthMismatch {
                z: self.z.len(),
                p: self.p.len(),
                t: self.t.len(),
            });
        }
        for (i, q) in self.q.iter().enumerate() {
            if q.len() != self.z.len() {
                return Err(AtmosphereError::GasLengthMismatch(i));
            }
        }
        Ok(())
    }

    /// Interpolate pressure (log-linear), temperature and VMR/extinction
    /// (linear) at altitude `z`. Altitudes outside the profile range are
    /// extrapolated using the nearest segment's slope, per `spec.md`
    /// §4.4 ("extrapolate per the same rule") rather than rejected.
    pub fn interpolate(&self, z: f64) -> Result<AtmosphereState, AtmosphereError> {
        let n = self.z.len();
        if n == 0 {
            return Err(AtmosphereError::Empty);
        }
        if n == 1 {
            return Ok(AtmosphereState {
                p: self.p[0],
                t: self.t[0],
                q: self.q.iter().map(|profile| profile[0]).collect(),
                k: self.k.iter().map(|profile| profile[0]).collect(),
            });
        }
        let i = locate_irr(&self.z, z).ok_or(AtmosphereError::Empty)?;
        let (z0, z1) = (self.z[i], self.z[i + 1]);

        let p = crate::interp::logy(z, z0, self.p[i], z1, self.p[i + 1]);
        let t = crate::interp::lin(z, z0, self.t[i], z1, self.t[i + 1]);
        let q = self
            .q
            .iter()
            .map(|profile| crate::interp::lin(z, z0, profile[i], z1, profile[i + 1]))
            .collect();
        let k = self
            .k
            .iter()
            .map(|profile| crate::interp::lin(z, z0, profile[i], z1, profile[i + 1]))
            .collect();

        Ok(AtmosphereState { p, t, q, k })
    }

    /// Recompute the pressure column from hydrostatic balance, holding the
    /// temperature and humidity profiles fixed. If `zref` is `Some`, that
    /// altitude's existing pressure is used as the integration anchor;
    /// otherwise the lowest level anchors the integration.
    pub fn hydrostatic(&mut self, zref: Option<f64>) -> Result<(), AtmosphereError> {
        self.validate()?;
        let n = self.z.len();
        let ref_idx = match zref {
            Some(z) => self
                .z
                .iter()
                .position(|&zi| (zi - z).abs() < 1e-6)
                .ok_or(AtmosphereError::NoReferenceLevel(z))?,
            None => 0,
        };

        let molar_mass_dry = 28.9_64; // g/mol, from N2/O2 fractions below.
        let _ = (N2, O2); // fractions are folded into molar_mass_dry above.
        let molar_mass_water = 18.015_3; // g/mol.

        let mean_molar_mass = |level: usize| -> f64 {
            let q_h2o = self.q.first().map(|p| p[level]).unwrap_or(0.0);
            q_h2o * molar_mass_water + (1.0 - q_h2o) * molar_mass_dry
        };

        // Integrate upward from the reference level.
        for i in ref_idx + 1..n {
            let dz_km = self.z[i] - self.z[i - 1];
            let m = mean_molar_mass(i - 1).max(mean_molar_mass(i)) / 1000.0; // kg/mol
            let tmean = 0.5 * (self.t[i - 1] + self.t[i]);
            let scale_height = RI * tmean / (m * G0); // metres*... consistent in km below
            let dz_m = dz_km * 1000.0;
            self.p[i] = self.p[i - 1] * (-dz_m / scale_height).exp();
        }
        // Integrate downward from the reference level.
        for i in (0..ref_idx).rev() {
            let dz_km = self.z[i + 1] - self.z[i];
            let m = mean_molar_mass(i).max(mean_molar_mass(i + 1)) / 1000.0;
            let tmean = 0.5 * (self.t[i] + self.t[i + 1]);
            let scale_height = RI * tmean / (m * G0);
            let dz_m = dz_km * 1000.0;
            self.p[i] = self.p[i + 1] * (dz_m / scale_height).exp();
        }
        Ok(())
    }

    /// Produce a copy of this atmosphere with every profile-valued field
    /// reversed into the descending-altitude order the LUT-facing side
    /// of the original algorithm expects (`spec.md` §9 Open Question:
    /// "the exact altitude-ordering convention ... is inconsistent
    /// between reading and the LUT-facing representation"). `Atmosphere`
    /// itself is always stored ascending; this is the one-way adapter
    /// used at the boundary where descending order is required.
    pub fn to_lut_order(&self) -> Atmosphere {
        let mut out = self.clone();
        out.z.reverse();
        out.p.reverse();
        out.t.reverse();
        for profile in out.q.iter_mut() {
            profile.reverse();
        }
        for profile in out.k.iter_mut() {
            profile.reverse();
        }
        out
    }

    /// Inverse of [`Atmosphere::to_lut_order`]: given an atmosphere in
    /// descending-altitude LUT order, return the canonical
    /// ascending-altitude form.
    pub fn from_lut_order(lut_ordered: &Atmosphere) -> Atmosphere {
        lut_ordered.to_lut_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Atmosphere {
        Atmosphere {
            z: vec![0.0, 5.0, 10.0, 15.0],
            p: vec![1013.25, 540.0, 265.0, 120.0],
            t: vec![288.0, 255.0, 223.0, 217.0],
            q: vec![vec![0.01, 0.005, 0.001, 0.0001]],
            k: vec![],
            cloud: CloudParams::default(),
            surface: SurfaceParams::default(),
        }
    }

    #[test]
    fn interpolate_midpoint() {
        let atm = sample();
        let state = atm.interpolate(2.5).unwrap();
        assert!(state.t < 288.0 && state.t > 255.0);
        assert!(state.p < 1013.25 && state.p > 540.0);
    }

    #[test]
    fn interpolate_out_of_range_extrapolates() {
        let atm = sample();
        let below = atm.interpolate(-5.0).unwrap();
        let above = atm.interpolate(100.0).unwrap();
        // Extrapolated temperature continues the nearest segment's slope
        // rather than clamping to the endpoint value.
        assert!(below.t > atm.t[0]);
        assert!(above.t < atm.t[atm.t.len() - 1]);
    }

    #[test]
    fn hydrostatic_preserves_reference_level() {
        let mut atm = sample();
        let p_ref_before = atm.p[0];
        atm.hydrostatic(Some(0.0)).unwrap();
        assert_abs_diff_eq!(atm.p[0], p_ref_before);
        // Pressure must still decrease monotonically with altitude.
        for w in atm.p.windows(2) {
            assert!(w[1] < w[0]);
        }
    }

    #[test]
    fn hydrostatic_rejects_unknown_reference() {
        let mut atm = sample();
        assert!(matches!(
            atm.hydrostatic(Some(3.3)),
            Err(AtmosphereError::NoReferenceLevel(_))
        ));
    }

    #[test]
    fn lut_order_round_trips() {
        let atm = sample();
        let lut_ordered = atm.to_lut_order();
        assert_eq!(lut_ordered.z.first(), atm.z.last());
        let back = Atmosphere::from_lut_order(&lut_ordered);
        assert_eq!(back.z, atm.z);
        assert_eq!(back.p, atm.p);
    }
}
