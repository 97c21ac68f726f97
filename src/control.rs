// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Control-parameter record (`ctl_t`): the fixed configuration for a forward
//! model or retrieval run. Field layout follows `ctl_t` in the original
//! C implementation; this record is `serde`-(de)serializable so an embedding
//! application can load it from YAML or TOML.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Errors validating a [`ControlParams`] record.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("channel list is empty")]
    NoChannels,

    #[error("gas list is empty")]
    NoGases,

    #[error("channel {0} has non-positive wavenumber {1}")]
    InvalidWavenumber(usize, f64),

    #[error("continuum flags and channel list are inconsistent")]
    InconsistentContinuumFlags,

    #[error("failed to parse control parameters: {0}")]
    Parse(String),
}

/// Which forward model computes transmittance along a line of sight.
#[derive(Debug, Display, EnumString, EnumIter, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ForwardModelKind {
    /// Curtis-Godson Approximation.
    Cga,
    /// Emissivity Growth Approximation.
    Ega,
    /// An externally supplied forward model (e.g. a line-by-line code).
    External,
}

/// How the surface contributes to the boundary radiance of a ray that
/// terminates on a surface hit.
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum SurfaceMode {
    /// The ray's surface hit is ignored; the boundary is treated as if
    /// the ray had exited to space.
    None,
    /// Emitted surface radiance only: `sft * eps_surface * B(sft, nu)`,
    /// with no downward-reflected term.
    Emissions,
    /// Emitted radiance plus a second downward integration pass folded
    /// in as `(1 - eps_surface) * L_downward`.
    Downward,
    /// As `Downward`, but `L_downward` is a reflected solar term rather
    /// than a second thermal pass.
    Solar,
}

/// Which continuum absorption models are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuumSet {
    pub co2: bool,
    pub h2o: bool,
    pub n2: bool,
    pub o2: bool,
}

impl ContinuumSet {
    pub const NONE: Self = Self {
        co2: false,
        h2o: false,
        n2: false,
        o2: false,
    };

    pub const ALL: Self = Self {
        co2: true,
        h2o: true,
        n2: true,
        o2: true,
    };
}

impl Default for ContinuumSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// The full control-parameter record for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlParams {
    /// Channel centre wavenumbers, cm^-1.
    pub channel_wavenumbers: Vec<f64>,

    /// Spectral window index assigned to each channel, indexing into the
    /// per-window aerosol extinction profiles `atm.k`. Defaults to
    /// window 0 for every channel.
    #[serde(default)]
    pub window: Vec<usize>,

    /// Names of the absorbing gases tracked by the retrieval/state vector.
    pub gases: Vec<String>,

    /// Which continuum models to apply.
    #[serde(default)]
    pub continua: ContinuumSet,

    /// Index into `gases`/the state vector of CO2, or `None` if CO2 is
    /// not a tracked gas (the "-1 if absent" convention, spelled as an
    /// `Option` rather than a sentinel).
    #[serde(default)]
    pub co2_gas_index: Option<usize>,

    /// Index into `gases`/the state vector of H2O, or `None` if absent.
    #[serde(default)]
    pub h2o_gas_index: Option<usize>,

    /// Index into `gases`/the state vector of N2, or `None` if absent.
    #[serde(default)]
    pub n2_gas_index: Option<usize>,

    /// Index into `gases`/the state vector of O2, or `None` if absent.
    #[serde(default)]
    pub o2_gas_index: Option<usize>,

    /// How a surface-terminated ray's boundary radiance is computed.
    #[serde(default = "default_surface_mode")]
    pub surface_mode: SurfaceMode,

    /// Whether the ray tracer bends paths via Snell's law.
    #[serde(default = "default_refraction")]
    pub refraction: bool,

    /// Maximum ray-tracing segment length, km.
    #[serde(default = "default_rayds")]
    pub rayds: f64,

    /// Maximum altitude change per ray-tracing segment, km, used to
    /// shorten the step below `rayds` when refraction is enabled.
    #[serde(default = "default_raydz")]
    pub raydz: f64,

    /// Forward model used to compute segment transmittance.
    #[serde(default = "default_forward_model")]
    pub forward_model: ForwardModelKind,

    /// Maximum number of points allowed in a traced line of sight.
    #[serde(default = "default_nlos")]
    pub max_los_points: usize,

    /// Maximum Levenberg-Marquardt iterations.
    #[serde(default = "default_max_iter")]
    pub max_iterations: usize,

    /// Initial Levenberg-Marquardt damping factor.
    #[serde(default = "default_lambda")]
    pub initial_lambda: f64,

    /// Convergence threshold on the normalised state-vector update.
    #[serde(default = "default_convergence")]
    pub convergence_threshold: f64,

    /// Field-of-view half-width, km, used to offset the `NFOV` sampling
    /// rays convolved by [`crate::fov::convolve`]. `None` disables FOV
    /// convolution (the nominal line of sight is used as-is).
    #[serde(default)]
    pub fov_half_width_km: Option<f64>,
}

fn default_forward_model() -> ForwardModelKind {
    ForwardModelKind::Cga
}

/// The forward-model kinds accepted by [`ForwardModelKind::from_str`],
/// joined for use in CLI help text and parse error messages.
pub fn forward_model_kinds() -> String {
    ForwardModelKind::iter().join(", ")
}

fn default_surface_mode() -> SurfaceMode {
    SurfaceMode::Emissions
}

fn default_refraction() -> bool {
    true
}

fn default_rayds() -> f64 {
    5.0
}

fn default_raydz() -> f64 {
    2.0
}

fn default_nlos() -> usize {
    crate::constants::NLOS
}

fn default_max_iter() -> usize {
    20
}

fn default_lambda() -> f64 {
    1e-3
}

fn default_convergence() -> f64 {
    1e-3
}

impl ControlParams {
    /// Parse a control-parameter record from a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let ctl: Self = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        ctl.validate()?;
        Ok(ctl)
    }

    /// Parse a control-parameter record from a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let ctl: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        ctl.validate()?;
        Ok(ctl)
    }

    /// Check internal consistency of the record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_wavenumbers.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.gases.is_empty() {
            return Err(ConfigError::NoGases);
        }
        for (i, &nu) in self.channel_wavenumbers.iter().enumerate() {
            if !(nu > 0.0) {
                return Err(ConfigError::InvalidWavenumber(i, nu));
            }
        }
        if !self.window.is_empty() && self.window.len() != self.channel_wavenumbers.len() {
            return Err(ConfigError::InconsistentContinuumFlags);
        }
        Ok(())
    }

    /// Spectral window assigned to `channel`, defaulting to window 0 when
    /// no explicit `window` list was configured.
    pub fn window_of(&self, channel: usize) -> usize {
        self.window.get(channel).copied().unwrap_or(0)
    }

    pub fn num_channels(&self) -> usize {
        self.channel_wavenumbers.len()
    }

    pub fn num_gases(&self) -> usize {
        self.gases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ControlParams {
        ControlParams {
            channel_wavenumbers: vec![667.0, 792.0],
            window: vec![0, 0],
            gases: vec!["CO2".to_string(), "H2O".to_string()],
            continua: ContinuumSet::ALL,
            co2_gas_index: Some(0),
            h2o_gas_index: Some(1),
            n2_gas_index: None,
            o2_gas_index: None,
            surface_mode: SurfaceMode::Emissions,
            refraction: true,
            rayds: default_rayds(),
            raydz: default_raydz(),
            forward_model: ForwardModelKind::Cga,
            max_los_points: default_nlos(),
            max_iterations: default_max_iter(),
            initial_lambda: default_lambda(),
            convergence_threshold: default_convergence(),
            fov_half_width_km: None,
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_channels_rejected() {
        let mut ctl = sample();
        ctl.channel_wavenumbers.clear();
        assert!(matches!(ctl.validate(), Err(ConfigError::NoChannels)));
    }

    #[test]
    fn non_positive_wavenumber_rejected() {
        let mut ctl = sample();
        ctl.channel_wavenumbers[1] = -1.0;
        assert!(matches!(
            ctl.validate(),
            Err(ConfigError::InvalidWavenumber(1, _))
        ));
    }

    #[test]
    fn forward_model_kind_round_trips_through_its_string_form() {
        use std::str::FromStr;
        assert_eq!(ForwardModelKind::Ega.to_string(), "ega");
        assert_eq!(ForwardModelKind::from_str("ega").unwrap(), ForwardModelKind::Ega);
    }

    #[test]
    fn forward_model_kinds_lists_all_variants() {
        let listed = forward_model_kinds();
        assert!(listed.contains("cga"));
        assert!(listed.contains("ega"));
        assert!(listed.contains("external"));
    }

    #[test]
    fn yaml_round_trip() {
        let ctl = sample();
        let text = serde_yaml::to_string(&ctl).unwrap();
        let parsed = ControlParams::from_yaml(&text).unwrap();
        assert_eq!(parsed.channel_wavenumbers, ctl.channel_wavenumbers);
    }
}
