// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Jacobian (kernel matrix) assembly: finite-difference sensitivity of
//! the measurement vector to each element of the state vector.

use nalgebra::DMatrix;
use rayon::prelude::*;
use thiserror::Error;

use crate::atmosphere::Atmosphere;
use crate::rt::RtError;
use crate::state::{pack_state, unpack_state, Quantity, StateTag};

/// Errors from kernel assembly.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("forward model evaluation failed: {0}")]
    ForwardModel(#[from] RtError),

    #[error("state vector is empty")]
    EmptyState,
}

/// Relative step size used to perturb p/q/k-valued state elements for
/// the forward-difference derivative.
const PERTURBATION_FRACTION: f64 = 1e-3;
const MIN_PERTURBATION: f64 = 1e-6;

/// Absolute perturbation for temperature-valued state elements, K.
const ABS_PERTURBATION_TEMPERATURE: f64 = 0.1;

/// Absolute perturbation for emissivity-valued state elements.
const ABS_PERTURBATION_EMISSIVITY: f64 = 1e-3;

/// Absolute perturbation for cloud-height-valued state elements, km.
const ABS_PERTURBATION_CLOUD_HEIGHT: f64 = 0.01;

/// Step size for the forward-difference perturbation of one state
/// element, quantity-dependent per `spec.md` §4.10: relative for
/// pressure/VMR/extinction, absolute for temperature, emissivity, and
/// cloud heights.
fn perturbation_step(quantity: Quantity, value: f64) -> f64 {
    match quantity {
        Quantity::Pressure | Quantity::Vmr(_) | Quantity::Extinction(_) | Quantity::CloudExtinction(_) => {
            (value.abs() * PERTURBATION_FRACTION).max(MIN_PERTURBATION)
        }
        Quantity::Temperature | Quantity::SurfaceTemperature => ABS_PERTURBATION_TEMPERATURE,
        Quantity::SurfaceEmissivity(_) => ABS_PERTURBATION_EMISSIVITY,
        Quantity::CloudTop | Quantity::CloudDepth => ABS_PERTURBATION_CLOUD_HEIGHT,
    }
}

/// Assemble the `m x n` Jacobian of the measurement vector (length `m`)
/// with respect to the state vector named by `tags` (length `n`), via
/// forward finite differences. `forward` re-runs the full forward model
/// on a perturbed atmosphere and returns the (flat) measurement vector.
///
/// State elements whose profile level falls entirely outside every
/// traced ray's altitude range are skipped (their column of the
/// Jacobian is left at zero), since perturbing them cannot affect the
/// measurement.
pub fn assemble(
    atm: &Atmosphere,
    tags: &[StateTag],
    ray_altitude_ranges: &[(f64, f64)],
    forward: impl Fn(&Atmosphere) -> Result<Vec<f64>, RtError> + Sync,
) -> Result<DMatrix<f64>, KernelError> {
    if tags.is_empty() {
        return Err(KernelError::EmptyState);
    }

    let x0 = pack_state(atm, tags);
    let y0 = forward(atm)?;
    let m = y0.len();
    let n = x0.len();

    let columns: Vec<Result<Vec<f64>, RtError>> = tags
        .par_iter()
        .enumerate()
        .map(|(j, tag)| -> Result<Vec<f64>, RtError> {
            if let Some(level) = tag.profile_index {
                let z = atm.z.get(level).copied();
                if let Some(z) = z {
                    let affects_any_ray = ray_altitude_ranges
                        .iter()
                        .any(|&(lo, hi)| z >= lo && z <= hi);
                    if !affects_any_ray && !ray_altitude_ranges.is_empty() {
                        return Ok(vec![0.0; m]);
                    }
                }
            }

            let step = perturbation_step(tag.quantity, x0[j]);
            let mut perturbed_x = x0.clone();
            perturbed_x[j] += step;

            let mut perturbed_atm = atm.clone();
            unpack_state(&mut perturbed_atm, tags, &perturbed_x);
            let y1 = forward(&perturbed_atm)?;

            Ok(y1
                .iter()
                .zip(&y0)
                .map(|(y1, y0)| (y1 - y0) / step)
                .collect())
        })
        .collect();

    let mut kernel = DMatrix::<f64>::zeros(m, n);
    for (j, column) in columns.into_iter().enumerate() {
        let column = column?;
        for i in 0..m {
            kernel[(i, j)] = column[i];
        }
    }
    Ok(kernel)
}
