// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Levenberg-Marquardt / optimal-estimation retrieval: iteratively
//! updates a state vector to minimise the (regularised) misfit between
//! simulated and observed radiances, using a Cholesky-solved normal
//! equation at each trial step.
//!
//! The dense linear algebra here (`nalgebra::DMatrix`/`DVector`,
//! `nalgebra::linalg::Cholesky`) follows the `nalgebra`-based
//! least-squares solver pattern used by GNSS navigation code.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::atmosphere::Atmosphere;
use crate::constants::{CLOUD_DEPTH_MIN, PMAX, PMIN, TMAX, TMIN};
use crate::control::ControlParams;
use crate::kernel::{self, KernelError};
use crate::rt::RtError;
use crate::state::{pack_state, unpack_state, Quantity, StateTag};

/// Errors from the retrieval loop.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    ForwardModel(#[from] RtError),

    #[error("Cholesky decomposition of the normal-equation matrix failed (ill-conditioned or non positive-definite)")]
    CholeskyFailed,

    #[error("measurement, noise, and a priori vectors have mismatched lengths")]
    LengthMismatch,
}

/// Outcome of a retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub state: Vec<f64>,
    pub converged: bool,
    pub num_iterations: usize,
    pub final_cost: f64,
}

/// A matrix with row/column quantity labels, for the retrieval's
/// posterior covariance, gain, and averaging-kernel outputs.
#[derive(Debug, Clone)]
pub struct TaggedMatrix {
    pub matrix: DMatrix<f64>,
    pub row_tags: Vec<StateTag>,
    pub col_tags: Vec<StateTag>,
}

/// Posterior error analysis: retrieval covariance, gain matrix, and
/// averaging kernel.
#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    pub posterior_covariance: TaggedMatrix,
    pub gain: TaggedMatrix,
    pub averaging_kernel: TaggedMatrix,
}

/// Clamp a trial state vector to the physical bounds named by the
/// retrieval's inner trial loop: `p` in `[PMIN, PMAX]`, `T` in
/// `[TMIN, TMAX]`, `q` in `[0, 1]`, `k`/cloud extinction/cloud top
/// non-negative, cloud depth at least [`CLOUD_DEPTH_MIN`], surface
/// temperature in `[TMIN, TMAX]`, surface emissivity in `[0, 1]`.
fn clamp_to_physical_bounds(tags: &[StateTag], x: &mut [f64]) {
    for (tag, value) in tags.iter().zip(x.iter_mut()) {
        match tag.quantity {
            Quantity::Pressure => *value = value.clamp(PMIN, PMAX),
            Quantity::Temperature => *value = value.clamp(TMIN, TMAX),
            Quantity::Vmr(_) => *value = value.clamp(0.0, 1.0),
            Quantity::Extinction(_) => *value = value.max(0.0),
            Quantity::CloudTop => *value = value.max(0.0),
            Quantity::CloudDepth => *value = value.max(CLOUD_DEPTH_MIN),
            Quantity::CloudExtinction(_) => *value = value.max(0.0),
            Quantity::SurfaceTemperature => *value = value.clamp(TMIN, TMAX),
            Quantity::SurfaceEmissivity(_) => *value = value.clamp(0.0, 1.0),
        }
    }
}

fn cost(residual: &DVector<f64>, se_inv: &DVector<f64>, dx: &DVector<f64>, sa_inv: &DVector<f64>) -> f64 {
    let data_term: f64 = residual
        .iter()
        .zip(se_inv.iter())
        .map(|(r, s)| r * r * s)
        .sum();
    let prior_term: f64 = dx.iter().zip(sa_inv.iter()).map(|(d, s)| d * d * s).sum();
    data_term + prior_term
}

/// Run Levenberg-Marquardt retrieval of `tags` against the measurement
/// vector `y_meas`, starting from the a priori atmosphere `atm_apriori`.
/// `sigma_obs` and `sigma_apriori` are 1-sigma uncertainties for the
/// measurement and a priori state respectively. `forward` runs the full
/// forward model (ray trace, LOS prep, absorber, RT integration, FOV)
/// and returns the flat measurement vector for a given atmosphere.
pub fn retrieve(
    ctl: &ControlParams,
    tags: &[StateTag],
    atm_apriori: &Atmosphere,
    y_meas: &[f64],
    sigma_obs: &[f64],
    sigma_apriori: &[f64],
    ray_altitude_ranges: &[(f64, f64)],
    forward: impl Fn(&Atmosphere) -> Result<Vec<f64>, RtError> + Sync,
) -> Result<RetrievalResult, RetrievalError> {
    if y_meas.len() != sigma_obs.len() || tags.len() != sigma_apriori.len() {
        return Err(RetrievalError::LengthMismatch);
    }

    let xa = DVector::from_vec(pack_state(atm_apriori, tags));
    let mut x = xa.clone();
    let y_meas = DVector::from_row_slice(y_meas);
    let se_inv = DVector::from_iterator(sigma_obs.len(), sigma_obs.iter().map(|s| 1.0 / (s * s)));
    let sa_inv =
        DVector::from_iterator(sigma_apriori.len(), sigma_apriori.iter().map(|s| 1.0 / (s * s)));

    let mut lambda = ctl.initial_lambda;
    let mut converged = false;
    let mut iterations_used = 0;
    let mut final_cost = f64::INFINITY;

    debug!(
        "starting retrieval: {} state elements, {} measurements, lambda0={:e}",
        xa.len(),
        y_meas.len(),
        lambda
    );

    for iteration in 0..ctl.max_iterations {
        iterations_used = iteration + 1;

        let mut atm = atm_apriori.clone();
        unpack_state(&mut atm, tags, x.as_slice());
        let y = DVector::from_vec(forward(&atm)?);
        let k = kernel::assemble(&atm, tags, ray_altitude_ranges, &forward)?;

        let residual = &y_meas - &y;
        let dx_prior = &x - &xa;
        final_cost = cost(&residual, &se_inv, &dx_prior, &sa_inv);

        let kt_se_inv = k.transpose() * DMatrix::from_diagonal(&se_inv);
        let normal_matrix = &kt_se_inv * &k;
        let rhs = &kt_se_inv * &residual - DMatrix::from_diagonal(&sa_inv) * &dx_prior;

        let mut accepted = false;
        for _trial in 0..20 {
            let damped = &normal_matrix + DMatrix::from_diagonal(&sa_inv.map(|s| s * lambda));
            let cholesky = match nalgebra::linalg::Cholesky::new(damped) {
                Some(c) => c,
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };
            let dx = cholesky.solve(&rhs);

            let mut trial_x: Vec<f64> = (x.clone() + &dx).iter().copied().collect();
            clamp_to_physical_bounds(tags, &mut trial_x);
            let trial_x = DVector::from_vec(trial_x);

            let mut trial_atm = atm_apriori.clone();
            unpack_state(&mut trial_atm, tags, trial_x.as_slice());
            let trial_y = DVector::from_vec(forward(&trial_atm)?);
            let trial_residual = &y_meas - &trial_y;
            let trial_dx_prior = &trial_x - &xa;
            let trial_cost = cost(&trial_residual, &se_inv, &trial_dx_prior, &sa_inv);

            if trial_cost < final_cost {
                // Normalised step size per iteration step 5: dx^T . rhs / n.
                let step_norm = dx.dot(&rhs) / tags.len() as f64;
                x = trial_x;
                final_cost = trial_cost;
                lambda = (lambda / 10.0).max(1e-12);
                accepted = true;
                if step_norm < ctl.convergence_threshold {
                    converged = true;
                }
                break;
            } else {
                lambda *= 10.0;
            }
        }

        debug!(
            "iteration {}: cost={:.6e} lambda={:e} accepted={}",
            iteration + 1,
            final_cost,
            lambda,
            accepted
        );

        if !accepted {
            // No trial step improved the cost even at maximum damping;
            // the iteration is stuck, report the best state found so far.
            warn!("retrieval stalled at iteration {}, no trial step improved the cost", iteration + 1);
            break;
        }
        if converged {
            break;
        }
    }

    Ok(RetrievalResult {
        state: x.iter().copied().collect(),
        converged,
        num_iterations: iterations_used,
        final_cost,
    })
}

/// Compute the posterior covariance, gain matrix, and averaging kernel
/// at the converged state `x`, given the same forward model and noise
/// parameters used by [`retrieve`].
pub fn error_analysis(
    atm: &Atmosphere,
    tags: &[StateTag],
    sigma_obs: &[f64],
    sigma_apriori: &[f64],
    ray_altitude_ranges: &[(f64, f64)],
    forward: impl Fn(&Atmosphere) -> Result<Vec<f64>, RtError> + Sync,
) -> Result<ErrorAnalysis, RetrievalError> {
    let k = kernel::assemble(atm, tags, ray_altitude_ranges, &forward)?;
    let se_inv = DVector::from_iterator(sigma_obs.len(), sigma_obs.iter().map(|s| 1.0 / (s * s)));
    let sa_inv =
        DVector::from_iterator(sigma_apriori.len(), sigma_apriori.iter().map(|s| 1.0 / (s * s)));

    let kt_se_inv = k.transpose() * DMatrix::from_diagonal(&se_inv);
    let normal_matrix = &kt_se_inv * &k + DMatrix::from_diagonal(&sa_inv);

    let cholesky =
        nalgebra::linalg::Cholesky::new(normal_matrix).ok_or(RetrievalError::CholeskyFailed)?;
    let identity = DMatrix::<f64>::identity(tags.len(), tags.len());
    let posterior_covariance = cholesky.solve(&identity);
    let gain = &posterior_covariance * &kt_se_inv;
    let averaging_kernel = &gain * &k;

    Ok(ErrorAnalysis {
        posterior_covariance: TaggedMatrix {
            matrix: posterior_covariance,
            row_tags: tags.to_vec(),
            col_tags: tags.to_vec(),
        },
        gain: TaggedMatrix {
            matrix: gain.clone(),
            row_tags: tags.to_vec(),
            col_tags: vec![],
        },
        averaging_kernel: TaggedMatrix {
            matrix: averaging_kernel,
            row_tags: tags.to_vec(),
            col_tags: tags.to_vec(),
        },
    })
}
