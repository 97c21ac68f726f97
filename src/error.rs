// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all limbtrace-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::{
    atmosphere::AtmosphereError, control::ConfigError, kernel::KernelError, lut::LutError,
    raytrace::RaytraceError, retrieval::RetrievalError,
};

/// The *only* publicly visible error from limbtrace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An error validating or loading control parameters.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error interpolating or hydrostatically balancing an atmosphere.
    #[error("atmosphere error: {0}")]
    Atmosphere(#[from] AtmosphereError),

    /// An error tracing a line of sight.
    #[error("ray trace error: {0}")]
    Raytrace(#[from] RaytraceError),

    /// An error looking up or interpolating an absorption lookup table.
    #[error("lookup table error: {0}")]
    Lut(#[from] LutError),

    /// An error assembling the Jacobian.
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    /// An error during Levenberg-Marquardt / optimal-estimation retrieval.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// A generic error that can't be clarified further, e.g. I/O.
    #[error("{0}")]
    Generic(String),
}
