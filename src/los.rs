// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-segment line-of-sight optical quantities: segment column amount,
//! cumulative Curtis-Godson weighted pressure/temperature/column amount,
//! and per-segment continuum optical depth.

use crate::atmosphere::Atmosphere;
use crate::constants::{KB, UMAX, UMIN};
use crate::continuum::ContinuumSet;
use crate::raytrace::LineOfSight;

/// Curtis-Godson optical quantities for one line-of-sight segment, for a
/// single absorbing gas: this segment's own column amount, and the
/// cumulative Curtis-Godson weighted state of the whole path up to and
/// including this segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentGas {
    /// This segment's column amount, molecules/cm^2, clamped to
    /// `[UMIN, UMAX]`.
    pub u: f64,
    /// Cumulative column amount from the start of the path to this
    /// segment, `cgu[g] = sum_{j<=i} u[g]`.
    pub cg_u: f64,
    /// Curtis-Godson-weighted pressure over the path so far, hPa:
    /// `cgp[g] = sum_{j<=i} p_j * u_j / cgu[g]`.
    pub cg_p: f64,
    /// Curtis-Godson-weighted temperature over the path so far, K.
    pub cg_t: f64,
}

/// Optical quantities for one line-of-sight segment: per-gas
/// Curtis-Godson values, segment mean temperature/pressure (used by the
/// source function and continuum models, not the absorber models), and
/// per-channel continuum optical depth.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub path_length_cm: f64,
    pub mean_p: f64,
    pub mean_t: f64,
    pub gases: Vec<SegmentGas>,
    /// Continuum optical depth per channel.
    pub continuum: Vec<f64>,
    /// Aerosol (per-window extinction profile `k`) optical depth per
    /// channel, `k[window[d]] * ds`.
    pub aerosol: Vec<f64>,
}

/// The full set of per-segment optical quantities for a traced line of
/// sight, ordered the same as the line of sight's segments (observer to
/// far end).
#[derive(Debug, Clone, Default)]
pub struct OpticalPath {
    pub segments: Vec<Segment>,
}

/// Compute Curtis-Godson optical quantities for every segment of `los`,
/// for each gas in `atm`, and, per segment, the continuum optical depth
/// on each channel in `channel_wavenumbers`.
///
/// `co2_gas_index`/`h2o_gas_index` select which entry of `atm.q`/`gases`
/// feeds the CO2 and H2O continuum models (`ControlParams::co2_gas_index`
/// and `::h2o_gas_index`); a `None` index (gas absent from the state
/// vector, or that continuum term not requested) contributes a zero
/// column amount/VMR rather than falling back to gas 0.
pub fn compute_optical_quantities(
    los: &LineOfSight,
    atm: &Atmosphere,
    channel_wavenumbers: &[f64],
    window: &[usize],
    continua: ContinuumSet,
    co2_gas_index: Option<usize>,
    h2o_gas_index: Option<usize>,
) -> OpticalPath {
    let num_gases = atm.q.len();
    let mut segments = Vec::with_capacity(los.points.len().saturating_sub(1));

    // Cumulative Curtis-Godson accumulators, one per gas: column amount,
    // and the running p*u / T*u sums that cg_p/cg_t are normalised from.
    let mut cgu = vec![0.0_f64; num_gases];
    let mut pu_sum = vec![0.0_f64; num_gases];
    let mut tu_sum = vec![0.0_f64; num_gases];

    for pair in los.points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let path_length_km = (b.path_length - a.path_length).abs();
        let path_length_cm = path_length_km * 1e5;

        let state_a = atm.interpolate(a.altitude);
        let state_b = atm.interpolate(b.altitude);
        let (state_a, state_b) = match (state_a, state_b) {
            (Ok(x), Ok(y)) => (x, y),
            _ => continue,
        };

        let mean_p = 0.5 * (state_a.p + state_b.p);
        let mean_t = 0.5 * (state_a.t + state_b.t);

        let mut gases = Vec::with_capacity(num_gases);
        for g in 0..num_gases {
            let q_mean = 0.5 * (state_a.q[g] + state_b.q[g]);
            // Number density from the ideal gas law, n = p / (kB T)
            // (molecules/m^3, p in Pa); u = q * n * ds, converted to
            // molecules/cm^2 with ds in cm (1e-6 m^-3 -> cm^-3).
            let p_pa = mean_p * 100.0;
            let number_density_m3 = p_pa / (KB * mean_t);
            let u = (number_density_m3 * q_mean * path_length_cm * 1e-6).clamp(UMIN, UMAX);

            cgu[g] += u;
            pu_sum[g] += mean_p * u;
            tu_sum[g] += mean_t * u;
            let (cg_p, cg_t) = if cgu[g] > 0.0 {
                (pu_sum[g] / cgu[g], tu_sum[g] / cgu[g])
            } else {
                (mean_p, mean_t)
            };

            gases.push(SegmentGas {
                u,
                cg_u: cgu[g],
                cg_p,
                cg_t,
            });
        }

        let continuum = channel_wavenumbers
            .iter()
            .map(|&nu| {
                let mut tau = 0.0;
                if continua.co2 {
                    let u_co2 = co2_gas_index.and_then(|g| gases.get(g)).map(|g| g.u).unwrap_or(0.0);
                    tau += crate::continuum::co2_continuum(nu, mean_p, mean_t, u_co2);
                }
                if continua.h2o {
                    let q_h2o = h2o_gas_index.and_then(|g| state_a.q.get(g)).copied().unwrap_or(0.0);
                    let u_h2o = h2o_gas_index.and_then(|g| gases.get(g)).map(|g| g.u).unwrap_or(0.0);
                    tau += crate::continuum::h2o_continuum(nu, mean_p, mean_t, q_h2o, u_h2o);
                }
                if continua.n2 {
                    tau += crate::continuum::n2_continuum(nu, mean_p, mean_t) * path_length_cm;
                }
                if continua.o2 {
                    tau += crate::continuum::o2_continuum(nu, mean_p, mean_t) * path_length_cm;
                }
                tau
            })
            .collect();

        let mean_k: Vec<f64> = (0..state_a.k.len())
            .map(|w| 0.5 * (state_a.k[w] + state_b.k[w]))
            .collect();
        let aerosol = (0..channel_wavenumbers.len())
            .map(|d| {
                let w = window.get(d).copied().unwrap_or(0);
                mean_k.get(w).copied().unwrap_or(0.0) * path_length_km
            })
            .collect();

        segments.push(Segment {
            path_length_cm,
            mean_p,
            mean_t,
            gases,
            continuum,
            aerosol,
        });
    }

    OpticalPath { segments }
}
