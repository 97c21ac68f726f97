// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Absorption lookup tables (`tbl_t`): a ragged structure indexed by
//! channel, gas, pressure, and temperature, holding tabulated column
//! amount `u` and emissivity `eps` axes used by the CGA/EGA absorber
//! models.

use ndarray::Array2;
use thiserror::Error;
use vec1::Vec1;

use crate::constants::{TMAX, TMIN};
use crate::interp::{locate_reg, locate_tbl, logx};

/// Errors from lookup-table construction or interpolation.
#[derive(Error, Debug)]
pub enum LutError {
    #[error("pressure level {0} has no temperature entries")]
    EmptyTemperatureAxis(usize),

    #[error("gas table has no pressure entries")]
    EmptyPressureAxis,

    #[error("temperature entry has mismatched u/eps axis lengths ({0} vs {1})")]
    AxisLengthMismatch(usize, usize),
}

/// One `(u, eps)` axis pair at a fixed pressure and temperature.
#[derive(Debug, Clone)]
pub struct TempLevel {
    pub t: f64,
    pub u: Vec<f32>,
    pub eps: Vec<f32>,
}

impl TempLevel {
    pub fn new(t: f64, u: Vec<f32>, eps: Vec<f32>) -> Result<Self, LutError> {
        if u.len() != eps.len() {
            return Err(LutError::AxisLengthMismatch(u.len(), eps.len()));
        }
        Ok(Self { t, u, eps })
    }
}

/// All temperature entries tabulated at a fixed pressure. Guaranteed
/// non-empty by construction, since an empty temperature axis at a
/// pressure level has no interpolation bracket.
#[derive(Debug, Clone)]
pub struct PressureLevel {
    pub p: f64,
    pub temps: Vec1<TempLevel>,
}

impl PressureLevel {
    pub fn new(p: f64, temps: Vec<TempLevel>) -> Result<Self, LutError> {
        Ok(Self {
            p,
            temps: Vec1::try_from_vec(temps).map_err(|_| LutError::EmptyTemperatureAxis(0))?,
        })
    }
}

/// A single-gas, single-channel absorption table: a ragged
/// pressure -> temperature -> (u, eps) structure. Guaranteed non-empty
/// at both the pressure and temperature axes by construction.
#[derive(Debug, Clone)]
pub struct GasTable {
    pub levels: Vec1<PressureLevel>,
}

impl GasTable {
    pub fn new(levels: Vec<PressureLevel>) -> Result<Self, LutError> {
        let levels = Vec1::try_from_vec(levels).map_err(|_| LutError::EmptyPressureAxis)?;
        Ok(Self { levels })
    }

    fn pressures(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.p).collect()
    }

    /// Bilinearly interpolate emissivity at `(p, t, u)` across the nearest
    /// four `(p, T)` corners, in `(log p, T)`, inverting each corner's `u`
    /// axis to read off `eps`. Out-of-range `u` is clamped to the axis
    /// endpoints.
    pub fn eps_at(&self, p: f64, t: f64, u: f64) -> f64 {
        let ps = self.pressures();
        let ip = match locate_tbl(&ps, p) {
            Some(i) => i,
            None => return eps_at_level(&self.levels[0], t, u),
        };
        let e0 = eps_at_level(&self.levels[ip], t, u);
        let e1 = eps_at_level(&self.levels[ip + 1], t, u);
        logx(p, ps[ip], e0, ps[ip + 1], e1)
    }

    /// Invert the `eps(u)` curve at `(p, t)` to find the column amount `u`
    /// giving emissivity `eps`, used by the EGA absorber model.
    pub fn u_at(&self, p: f64, t: f64, eps: f64, clamps: &mut super::diagnostics::ClampCounters) -> f64 {
        let ps = self.pressures();
        let ip = match locate_tbl(&ps, p) {
            Some(i) => i,
            None => return u_at_level(&self.levels[0], t, eps, clamps),
        };
        let u0 = u_at_level(&self.levels[ip], t, eps, clamps);
        let u1 = u_at_level(&self.levels[ip + 1], t, eps, clamps);
        logx(p, ps[ip], u0, ps[ip + 1], u1)
    }
}

fn temps_of(level: &PressureLevel) -> Vec<f64> {
    level.temps.iter().map(|t| t.t).collect()
}

fn eps_at_level(level: &PressureLevel, t: f64, u: f64) -> f64 {
    let ts = temps_of(level);
    let it = match locate_tbl(&ts, t) {
        Some(i) => i,
        None => return eps_at_temp(&level.temps[0], u),
    };
    let e0 = eps_at_temp(&level.temps[it], u);
    let e1 = eps_at_temp(&level.temps[it + 1], u);
    crate::interp::lin(t, ts[it], e0, ts[it + 1], e1)
}

fn eps_at_temp(temp: &TempLevel, u: f64) -> f64 {
    if temp.u.is_empty() {
        return 0.0;
    }
    let us: Vec<f64> = temp.u.iter().map(|&x| x as f64).collect();
    match locate_tbl(&us, u) {
        Some(i) => {
            let (u0, e0) = (us[i], temp.eps[i] as f64);
            let (u1, e1) = (us[i + 1], temp.eps[i + 1] as f64);
            crate::interp::lin(u.clamp(us[0], *us.last().unwrap()), u0, e0, u1, e1)
        }
        None => temp.eps[0] as f64,
    }
}

fn u_at_level(level: &PressureLevel, t: f64, eps: f64, clamps: &mut super::diagnostics::ClampCounters) -> f64 {
    let ts = temps_of(level);
    let it = match locate_tbl(&ts, t) {
        Some(i) => i,
        None => return u_at_temp(&level.temps[0], eps, clamps),
    };
    let u0 = u_at_temp(&level.temps[it], eps, clamps);
    let u1 = u_at_temp(&level.temps[it + 1], eps, clamps);
    crate::interp::lin(t, ts[it], u0, ts[it + 1], u1)
}

fn u_at_temp(temp: &TempLevel, eps: f64, clamps: &mut super::diagnostics::ClampCounters) -> f64 {
    if temp.eps.is_empty() {
        return 0.0;
    }
    let lo = *temp.eps.first().unwrap() as f64;
    let hi = *temp.eps.last().unwrap() as f64;
    let (emin, emax) = (lo.min(hi), lo.max(hi));
    if eps < emin || eps > emax {
        clamps.u_at_out_of_range += 1;
    }
    let es: Vec<f64> = temp.eps.iter().map(|&x| x as f64).collect();
    match locate_tbl(&es, eps.clamp(emin, emax)) {
        Some(i) => {
            let (e0, u0) = (es[i], temp.u[i] as f64);
            let (e1, u1) = (es[i + 1], temp.u[i + 1] as f64);
            crate::interp::lin(eps.clamp(emin, emax), e0, u0, e1, u1)
        }
        None => temp.u[0] as f64,
    }
}

/// The dense Planck source-function table (`srcfunc_t`): a uniform
/// temperature grid in `[TMIN, TMAX]`, and the Planck radiance at each
/// channel and grid temperature, giving the source function an O(1)
/// lookup instead of re-evaluating `exp()` on every line-of-sight
/// segment.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Uniform temperature grid, K.
    pub temps: Vec<f64>,
    /// Planck radiance, shape `(channels, temps.len())`.
    pub radiance: Array2<f64>,
}

impl Default for SourceTable {
    fn default() -> Self {
        Self {
            temps: Vec::new(),
            radiance: Array2::zeros((0, 0)),
        }
    }
}

impl SourceTable {
    /// Build the table by evaluating the Planck law at `num_temps`
    /// uniformly spaced temperatures in `[TMIN, TMAX]`, for every channel
    /// in `channel_wavenumbers`.
    pub fn build(channel_wavenumbers: &[f64], num_temps: usize) -> Self {
        let num_temps = num_temps.max(2);
        let step = (TMAX - TMIN) / (num_temps - 1) as f64;
        let temps: Vec<f64> = (0..num_temps).map(|i| TMIN + step * i as f64).collect();
        let mut radiance = Array2::zeros((channel_wavenumbers.len(), num_temps));
        for (d, &nu) in channel_wavenumbers.iter().enumerate() {
            for (i, &t) in temps.iter().enumerate() {
                radiance[(d, i)] = crate::source::planck(nu, t);
            }
        }
        Self { temps, radiance }
    }

    /// Interpolated source radiance at `channel`, temperature `t`
    /// (clamped to `[TMIN, TMAX]`), by O(1) bracket location on the
    /// uniform temperature grid.
    pub fn source(&self, channel: usize, t: f64) -> Option<f64> {
        if self.temps.len() < 2 || channel >= self.radiance.nrows() {
            return None;
        }
        let t = t.clamp(TMIN, TMAX);
        let i = locate_reg(&self.temps, t)?;
        let (t0, t1) = (self.temps[i], self.temps[i + 1]);
        let (r0, r1) = (self.radiance[(channel, i)], self.radiance[(channel, i + 1)]);
        Some(crate::interp::lin(t, t0, r0, t1, r1))
    }
}

/// The complete set of absorption tables for a run: `[channel][gas]`.
#[derive(Debug, Clone, Default)]
pub struct LutStore {
    pub channels: usize,
    pub gases: usize,
    tables: Vec<Vec<Option<GasTable>>>,
    pub source: SourceTable,
}

impl LutStore {
    pub fn new(channels: usize, gases: usize) -> Self {
        Self {
            channels,
            gases,
            tables: vec![vec![None; gases]; channels],
            source: SourceTable::default(),
        }
    }

    pub fn set_table(&mut self, channel: usize, gas: usize, table: GasTable) {
        self.tables[channel][gas] = Some(table);
    }

    pub fn table(&self, channel: usize, gas: usize) -> Option<&GasTable> {
        self.tables[channel][gas].as_ref()
    }

    /// Emissivity for `(channel, gas)` at `(p, t, u)`; `0.0` when no table
    /// is tabulated for this combination (the gas does not contribute on
    /// this channel).
    pub fn eps_at(&self, channel: usize, gas: usize, p: f64, t: f64, u: f64) -> f64 {
        match self.table(channel, gas) {
            Some(tbl) => tbl.eps_at(p, t, u),
            None => 0.0,
        }
    }

    /// Fill the dense Planck source-function table on startup: `num_temps`
    /// uniform temperatures in `[TMIN, TMAX]`, evaluated on every channel
    /// in `channel_wavenumbers`.
    pub fn build_source_table(&mut self, channel_wavenumbers: &[f64], num_temps: usize) {
        self.source = SourceTable::build(channel_wavenumbers, num_temps);
    }

    /// Source radiance at `channel`, temperature `t`: the tabulated O(1)
    /// lookup when [`LutStore::build_source_table`] has been called,
    /// falling back to a direct Planck evaluation at `channel_wavenumber`
    /// otherwise.
    pub fn source(&self, channel: usize, channel_wavenumber: f64, t: f64) -> f64 {
        self.source
            .source(channel, t)
            .unwrap_or_else(|| crate::source::planck(channel_wavenumber, t.clamp(TMIN, TMAX)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ClampCounters;
    use approx::assert_abs_diff_eq;

    fn sample_gas_table() -> GasTable {
        let temp_levels = vec![
            TempLevel::new(200.0, vec![0.0, 1.0, 2.0], vec![0.0, 0.5, 0.9]).unwrap(),
            TempLevel::new(250.0, vec![0.0, 1.0, 2.0], vec![0.0, 0.6, 0.95]).unwrap(),
        ];
        let levels = vec![
            PressureLevel::new(100.0, temp_levels.clone()).unwrap(),
            PressureLevel::new(10.0, temp_levels).unwrap(),
        ];
        GasTable::new(levels).unwrap()
    }

    #[test]
    fn eps_increases_with_u() {
        let tbl = sample_gas_table();
        let e_lo = tbl.eps_at(50.0, 225.0, 0.2);
        let e_hi = tbl.eps_at(50.0, 225.0, 1.8);
        assert!(e_hi > e_lo);
    }

    #[test]
    fn u_at_inverts_eps_at() {
        let tbl = sample_gas_table();
        let mut clamps = ClampCounters::default();
        let u = tbl.u_at(50.0, 225.0, 0.55, &mut clamps);
        let eps = tbl.eps_at(50.0, 225.0, u);
        assert_abs_diff_eq!(eps, 0.55, epsilon = 1e-6);
    }

    #[test]
    fn u_at_clamps_out_of_range_eps() {
        let tbl = sample_gas_table();
        let mut clamps = ClampCounters::default();
        let _ = tbl.u_at(50.0, 225.0, 5.0, &mut clamps);
        assert_eq!(clamps.u_at_out_of_range, 1);
    }

    #[test]
    fn missing_table_gives_zero_emissivity() {
        let store = LutStore::new(2, 2);
        assert_abs_diff_eq!(store.eps_at(0, 0, 50.0, 220.0, 1.0), 0.0);
    }

    #[test]
    fn source_falls_back_to_planck_before_the_table_is_built() {
        let store = LutStore::new(1, 1);
        let direct = crate::source::planck(667.0, 250.0);
        assert_abs_diff_eq!(store.source(0, 667.0, 250.0), direct, epsilon = 1e-12);
    }

    #[test]
    fn source_table_matches_planck_on_its_own_grid() {
        let mut store = LutStore::new(1, 1);
        store.build_source_table(&[667.0], 50);
        let t = store.source.temps[10];
        let looked_up = store.source(0, 667.0, t);
        let direct = crate::source::planck(667.0, t);
        assert_abs_diff_eq!(looked_up, direct, epsilon = 1e-6);
    }

    #[test]
    fn source_table_interpolates_between_grid_points() {
        let mut store = LutStore::new(2, 1);
        store.build_source_table(&[667.0, 1000.0], 10);
        let looked_up = store.source(1, 1000.0, 210.0);
        let direct = crate::source::planck(1000.0, 210.0);
        assert_abs_diff_eq!(looked_up, direct, epsilon = 1.0);
    }
}
