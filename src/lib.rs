// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An infrared limb/nadir radiative-transfer and retrieval core: ray
//! tracing, Curtis-Godson line-of-sight optics, lookup-table absorber
//! models, radiative-transfer integration with field-of-view
//! convolution, and Levenberg-Marquardt/optimal-estimation retrieval.

pub mod absorber;
pub mod atmosphere;
pub mod constants;
pub mod continuum;
pub mod control;
pub mod diagnostics;
pub(crate) mod error;
pub mod forward;
pub mod fov;
pub mod geodesy;
pub mod interp;
pub mod io;
pub mod kernel;
pub mod logging;
pub mod los;
pub mod lut;
pub mod observation;
pub mod raytrace;
pub mod retrieval;
pub mod rt;
pub mod source;
pub mod state;

// Re-exports.
pub use atmosphere::Atmosphere;
pub use control::ControlParams;
pub use error::CoreError;
pub use forward::run_observations;
pub use lut::LutStore;
pub use observation::{Observation, Observations};
pub use retrieval::{retrieve, RetrievalResult};
