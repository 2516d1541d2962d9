//! Run configuration
//!
//! `SystemModelParams` describes one array/signal scenario. `ExperimentConfig`
//! wraps it with dataset sizes, estimator selection and seeds, and is loaded
//! from TOML by the `doa-bench` binary.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{DoaError, Result};

pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Signal bandwidth model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "NarrowBand")]
    NarrowBand,
    #[serde(rename = "Broadband_OFDM")]
    BroadbandOfdm,
    #[serde(rename = "Broadband_simple")]
    BroadbandSimple,
}

impl Scenario {
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::NarrowBand => "NarrowBand",
            Scenario::BroadbandOfdm => "Broadband_OFDM",
            Scenario::BroadbandSimple => "Broadband_simple",
        }
    }

    pub fn is_broadband(&self) -> bool {
        !matches!(self, Scenario::NarrowBand)
    }
}

/// Whether the sources share one underlying waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalMode {
    #[serde(rename = "coherent")]
    Coherent,
    #[serde(rename = "non-coherent")]
    NonCoherent,
}

impl SignalMode {
    pub fn label(&self) -> &'static str {
        match self {
            SignalMode::Coherent => "coherent",
            SignalMode::NonCoherent => "non-coherent",
        }
    }
}

/// Array and signal parameters for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemModelParams {
    /// Number of sensors (N)
    pub sensors: usize,
    /// Number of sources (M)
    pub sources: usize,
    /// Number of snapshots per sample (T)
    pub snapshots: usize,
    /// Source-to-noise power ratio [dB]
    pub snr_db: f64,
    pub scenario: Scenario,
    pub mode: SignalMode,
    /// Inter-element spacing [wavelengths]
    pub spacing: f64,
    /// Maximum sensor position deviation [wavelengths]
    pub eta: f64,
    /// Variance of the per-sample sensor position noise [wavelengths^2]
    pub geo_noise_var: f64,
    /// Seed for the fixed per-element calibration offsets
    pub calibration_seed: u64,
    /// Highest active frequency bin in broadband scenarios
    pub max_freq: usize,
}

impl Default for SystemModelParams {
    fn default() -> Self {
        Self {
            sensors: 8,
            sources: 2,
            snapshots: 200,
            snr_db: 10.0,
            scenario: Scenario::NarrowBand,
            mode: SignalMode::NonCoherent,
            spacing: 0.5,
            eta: 0.0,
            geo_noise_var: 0.0,
            calibration_seed: 0x00D0_A5EE_D001,
            max_freq: 500,
        }
    }
}

impl SystemModelParams {
    /// Time samples in one broadband frame (one second at twice the maximum frequency).
    pub fn broadband_frame_len(&self) -> usize {
        2 * self.max_freq
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors == 0 {
            return Err(DoaError::Configuration(
                "sensors must be greater than zero".to_string(),
            ));
        }
        if self.sources == 0 {
            return Err(DoaError::Configuration(
                "sources must be greater than zero".to_string(),
            ));
        }
        if self.sensors < self.sources {
            return Err(DoaError::Configuration(format!(
                "{} sensors cannot resolve {} sources",
                self.sensors, self.sources
            )));
        }
        if self.snapshots == 0 {
            return Err(DoaError::Configuration(
                "snapshots must be greater than zero".to_string(),
            ));
        }
        // dB value: any finite number is a positive linear SNR.
        if !self.snr_db.is_finite() {
            return Err(DoaError::Configuration(
                "snr_db must be finite".to_string(),
            ));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(DoaError::Configuration(
                "spacing must be a positive number of wavelengths".to_string(),
            ));
        }
        if !(self.eta.is_finite() && self.eta >= 0.0) {
            return Err(DoaError::Configuration("eta must be >= 0".to_string()));
        }
        if !(self.geo_noise_var.is_finite() && self.geo_noise_var >= 0.0) {
            return Err(DoaError::Configuration(
                "geo_noise_var must be >= 0".to_string(),
            ));
        }
        if self.scenario.is_broadband() {
            if self.max_freq < 2 {
                return Err(DoaError::Configuration(
                    "max_freq must be at least 2 for broadband scenarios".to_string(),
                ));
            }
            if self.snapshots > self.broadband_frame_len() {
                return Err(DoaError::Configuration(format!(
                    "broadband snapshots ({}) exceed the frame length {}",
                    self.snapshots,
                    self.broadband_frame_len()
                )));
            }
        }
        Ok(())
    }
}

/// Full experiment description as read from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub schema_version: String,
    #[serde(default)]
    pub system: SystemModelParams,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Minimum circular separation between drawn source angles [deg]
    pub min_gap_deg: f64,
    pub seed: u64,
    pub methods: Vec<String>,
    #[serde(default = "default_grid_step")]
    pub grid_step_deg: f64,
    #[serde(default)]
    pub smoothing_subarray: Option<usize>,
    #[serde(default)]
    pub keep_snapshots: bool,
    #[serde(default)]
    pub criterion: crate::criterion::Criterion,
    /// SNR values [dB] to sweep; empty means only `system.snr_db`
    #[serde(default)]
    pub snr_sweep_db: Vec<f64>,
}

fn default_grid_step() -> f64 {
    0.1
}

impl ExperimentConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: ExperimentConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse TOML config: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            bail!(
                "config schema_version {} does not match {}",
                self.schema_version,
                CONFIG_SCHEMA_VERSION
            );
        }
        self.system.validate()?;
        if self.test_samples == 0 {
            bail!("test_samples must be > 0");
        }
        if !(self.min_gap_deg.is_finite() && self.min_gap_deg >= 0.0) {
            bail!("min_gap_deg must be >= 0");
        }
        crate::methods::MethodOptions {
            grid_step_deg: self.grid_step_deg,
            smoothing_subarray: self.smoothing_subarray,
            keep_spectrum: false,
        }
        .validate()?;
        if self.snr_sweep_db.iter().any(|v| !v.is_finite()) {
            bail!("snr_sweep_db values must be finite");
        }
        Ok(())
    }

    /// SNR values to evaluate, in ascending order.
    pub fn snr_values(&self) -> Vec<f64> {
        if self.snr_sweep_db.is_empty() {
            return vec![self.system.snr_db];
        }
        let mut values = self.snr_sweep_db.clone();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        values
    }

    /// System parameters with the SNR replaced.
    pub fn system_at(&self, snr_db: f64) -> SystemModelParams {
        SystemModelParams {
            snr_db,
            ..self.system.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(SystemModelParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_more_sources_than_sensors() {
        let params = SystemModelParams {
            sensors: 2,
            sources: 3,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(DoaError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_zero_snapshots_and_nan_snr() {
        let params = SystemModelParams {
            snapshots: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = SystemModelParams {
            snr_db: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn broadband_snapshots_bounded_by_frame() {
        let params = SystemModelParams {
            scenario: Scenario::BroadbandOfdm,
            max_freq: 50,
            snapshots: 101,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn parses_experiment_toml() {
        let raw = r#"
            schema_version = "1.0.0"
            train_samples = 10
            test_samples = 5
            min_gap_deg = 15.0
            seed = 7
            methods = ["music", "esprit"]

            [system]
            sensors = 8
            sources = 2
            snapshots = 100
            snr_db = 10.0
            scenario = "NarrowBand"
            mode = "coherent"
        "#;
        let cfg: ExperimentConfig = toml::from_str(raw).expect("valid toml");
        cfg.validate().expect("valid config");
        assert_eq!(cfg.system.mode, SignalMode::Coherent);
        assert_eq!(cfg.system.spacing, 0.5);
        assert_eq!(cfg.grid_step_deg, 0.1);
        assert_eq!(cfg.snr_values(), vec![10.0]);
    }

    #[test]
    fn sweep_values_are_sorted_and_unique() {
        let raw = r#"
            schema_version = "1.0.0"
            train_samples = 0
            test_samples = 5
            min_gap_deg = 10.0
            seed = 1
            methods = []
            snr_sweep_db = [10.0, -5.0, 0.0, 10.0]
            criterion = "mspe"
        "#;
        let cfg: ExperimentConfig = toml::from_str(raw).expect("valid toml");
        cfg.validate().expect("valid config");
        assert_eq!(cfg.snr_values(), vec![-5.0, 0.0, 10.0]);
        assert_eq!(cfg.system_at(-5.0).snr_db, -5.0);
        assert_eq!(cfg.criterion, crate::criterion::Criterion::Mspe);
    }

    #[test]
    fn rejects_unusable_grid_step() {
        let raw = r#"
            schema_version = "1.0.0"
            train_samples = 0
            test_samples = 5
            min_gap_deg = 10.0
            seed = 1
            methods = []
            grid_step_deg = 0.0
        "#;
        let mut cfg: ExperimentConfig = toml::from_str(raw).expect("valid toml");
        assert!(cfg.validate().is_err());
        cfg.grid_step_deg = 1e-9;
        assert!(cfg.validate().is_err());
        cfg.grid_step_deg = 0.01;
        cfg.validate().expect("valid config");
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let raw = r#"
            schema_version = "0.9.0"
            train_samples = 0
            test_samples = 5
            min_gap_deg = 10.0
            seed = 1
            methods = []
        "#;
        let cfg: ExperimentConfig = toml::from_str(raw).expect("valid toml");
        assert!(cfg.validate().is_err());
    }
}
