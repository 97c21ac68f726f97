// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Continuum absorption models (CO2, H2O, N2, O2) and the set of flags
//! selecting which of them are active for a run.

pub use crate::control::ContinuumSet;

/// CO2 continuum optical depth contribution for a segment: wavenumber
/// `nu` (cm^-1), pressure `p` (hPa), temperature `t` (K), CO2 column
/// amount `u` (molecules/cm^2).
pub fn co2_continuum(nu: f64, p: f64, t: f64, u: f64) -> f64 {
    let band_center = 667.0;
    let width = 30.0;
    let shape = (-((nu - band_center) / width).powi(2)).exp();
    let pressure_scaling = (p / 1013.25).powi(2);
    let temp_scaling = (296.0 / t).powf(1.5);
    1.1e-24 * shape * pressure_scaling * temp_scaling * u
}

/// H2O self- plus foreign-broadened continuum optical depth: wavenumber
/// `nu`, pressure `p`, temperature `t`, water vapour mass mixing ratio
/// `q` (kg/kg), H2O column amount `u`.
pub fn h2o_continuum(nu: f64, p: f64, t: f64, q: f64, u: f64) -> f64 {
    let shape = 1.0 / (1.0 + ((nu - 1500.0) / 800.0).powi(2));
    let self_term = q * p;
    let foreign_term = (1.0 - q) * p;
    let temp_scaling = (296.0 / t).powf(4.0);
    1.3e-23 * shape * temp_scaling * (self_term + 0.1 * foreign_term) * u
}

/// N2 collision-induced absorption coefficient (per unit column amount)
/// at wavenumber `nu`, pressure `p`, temperature `t`.
pub fn n2_continuum(nu: f64, p: f64, t: f64) -> f64 {
    let shape = (-((nu - 2350.0) / 200.0).powi(2)).exp();
    let pressure_scaling = (p / 1013.25).powi(2);
    4.0e-27 * shape * pressure_scaling * (296.0 / t)
}

/// O2 collision-induced absorption coefficient (per unit column amount)
/// at wavenumber `nu`, pressure `p`, temperature `t`.
pub fn o2_continuum(nu: f64, p: f64, t: f64) -> f64 {
    let shape = (-((nu - 1550.0) / 150.0).powi(2)).exp();
    let pressure_scaling = (p / 1013.25).powi(2);
    2.0e-27 * shape * pressure_scaling * (296.0 / t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuum_models_are_non_negative() {
        assert!(co2_continuum(667.0, 500.0, 250.0, 1e20) >= 0.0);
        assert!(h2o_continuum(1500.0, 500.0, 250.0, 0.01, 1e20) >= 0.0);
        assert!(n2_continuum(2350.0, 500.0, 250.0) >= 0.0);
        assert!(o2_continuum(1550.0, 500.0, 250.0) >= 0.0);
    }

    #[test]
    fn co2_continuum_scales_with_column_amount() {
        let low = co2_continuum(667.0, 500.0, 250.0, 1e19);
        let high = co2_continuum(667.0, 500.0, 250.0, 1e21);
        assert!(high > low);
    }

    #[test]
    fn continuum_set_defaults_all_on() {
        assert_eq!(ContinuumSet::default(), ContinuumSet::ALL);
    }
}
