use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::Serialize;

use crate::error::{DoaError, Result};
use crate::system_model::ArrayGeometry;

pub mod esprit;
pub mod hybrid;
pub mod music;
pub mod mvdr;
pub mod root_music;
pub mod smoothing;

use esprit::Esprit;
use music::Music;
use mvdr::Mvdr;
use root_music::RootMusic;
use smoothing::SpatiallySmoothed;

pub const METHOD_ORDER: [&str; 7] = [
    "music",
    "r-music",
    "esprit",
    "mvdr",
    "sps-music",
    "sps-r-music",
    "sps-esprit",
];

/// Diagnostic pseudo-spectrum over an angle grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    pub grid_deg: Vec<f64>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EstimateStatus {
    Complete,
    /// Fewer than the requested number of sources were found; the missing
    /// angles are NaN.
    Degenerate { found: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    /// Estimated angles [deg], ascending, NaN entries last.
    pub angles_deg: Vec<f64>,
    pub spectrum: Option<Spectrum>,
    pub status: EstimateStatus,
}

impl EstimationResult {
    /// Pads `found` up to `sources` entries with NaN and sorts ascending.
    pub fn from_candidates(mut found: Vec<f64>, sources: usize, spectrum: Option<Spectrum>) -> Self {
        found.truncate(sources);
        let status = if found.len() < sources {
            EstimateStatus::Degenerate { found: found.len() }
        } else {
            EstimateStatus::Complete
        };
        found.resize(sources, f64::NAN);
        found.sort_by(|a, b| a.total_cmp(b));
        Self {
            angles_deg: found,
            spectrum,
            status,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == EstimateStatus::Complete
    }

    /// Turns a degenerate result into `DoaError::DegenerateSpectrum`.
    pub fn require_complete(self) -> Result<Self> {
        match self.status {
            EstimateStatus::Complete => Ok(self),
            EstimateStatus::Degenerate { found } => Err(DoaError::DegenerateSpectrum {
                expected: self.angles_deg.len(),
                found,
            }),
        }
    }
}

/// Common contract of every covariance-based DOA estimator.
pub trait SubspaceMethod {
    fn name(&self) -> &'static str;
    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodOptions {
    /// Angle grid step for spectrum searches [deg]
    pub grid_step_deg: f64,
    /// Subarray length for spatial smoothing; `None` means sources + 1
    pub smoothing_subarray: Option<usize>,
    /// Keep the pseudo-spectrum in the result
    pub keep_spectrum: bool,
}

/// Finest supported spectrum grid step [deg].
pub const MIN_GRID_STEP_DEG: f64 = 1e-3;

impl MethodOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.grid_step_deg.is_finite() && self.grid_step_deg >= MIN_GRID_STEP_DEG) {
            return Err(DoaError::Configuration(format!(
                "grid_step_deg must be at least {MIN_GRID_STEP_DEG}, got {}",
                self.grid_step_deg
            )));
        }
        if self.grid_step_deg > 180.0 {
            return Err(DoaError::Configuration(format!(
                "grid_step_deg must not exceed 180, got {}",
                self.grid_step_deg
            )));
        }
        Ok(())
    }
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            grid_step_deg: 0.1,
            smoothing_subarray: None,
            keep_spectrum: false,
        }
    }
}

/// Angle grid covering [-90, 90] deg. `step_deg` must pass
/// [`MethodOptions::validate`].
pub fn angle_grid(step_deg: f64) -> Vec<f64> {
    let steps = (180.0 / step_deg).round() as usize;
    (0..=steps)
        .map(|i| (-90.0 + i as f64 * step_deg).min(90.0))
        .collect()
}

/// Interior local maxima of a spectrum, strongest first.
///
/// A plateau counts once, at its left edge. Ties on value prefer the smaller
/// angle.
pub fn spectrum_peaks(grid_deg: &[f64], values: &[f64]) -> Vec<(f64, f64)> {
    let mut peaks = Vec::new();
    if values.len() < 3 {
        return peaks;
    }
    for i in 1..values.len() - 1 {
        if values[i] > values[i - 1] && values[i] >= values[i + 1] {
            peaks.push((grid_deg[i], values[i]));
        }
    }
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));
    peaks
}

/// Picks the `sources` strongest peaks of a spectrum and logs a degenerate search.
pub(crate) fn pick_peaks(
    method: &'static str,
    grid_deg: Vec<f64>,
    values: Vec<f64>,
    sources: usize,
    keep_spectrum: bool,
) -> EstimationResult {
    let found: Vec<f64> = spectrum_peaks(&grid_deg, &values)
        .into_iter()
        .take(sources)
        .map(|(angle, _)| angle)
        .collect();
    if found.len() < sources {
        tracing::warn!(
            method,
            found = found.len(),
            sources,
            "degenerate spectrum, missing sources reported as NaN"
        );
    }
    let spectrum = keep_spectrum.then(|| Spectrum { grid_deg, values });
    EstimationResult::from_candidates(found, sources, spectrum)
}

pub fn build_method(
    name: &str,
    geometry: &ArrayGeometry,
    options: &MethodOptions,
) -> Result<Box<dyn SubspaceMethod>> {
    options.validate()?;
    let method: Box<dyn SubspaceMethod> = match name {
        "music" => Box::new(Music::new(geometry.clone(), options)),
        "r-music" => Box::new(RootMusic::new(geometry.spacing())),
        "esprit" => Box::new(Esprit::new(geometry.spacing())),
        "mvdr" => Box::new(Mvdr::new(geometry.clone(), options)),
        "sps-music" => Box::new(SpatiallySmoothed::new(
            "sps-music",
            options.smoothing_subarray,
            {
                let geometry = geometry.clone();
                let options = options.clone();
                move |len| Box::new(Music::new(geometry.subarray(len), &options)) as Box<dyn SubspaceMethod>
            },
        )),
        "sps-r-music" => Box::new(SpatiallySmoothed::new(
            "sps-r-music",
            options.smoothing_subarray,
            {
                let spacing = geometry.spacing();
                move |_| Box::new(RootMusic::new(spacing)) as Box<dyn SubspaceMethod>
            },
        )),
        "sps-esprit" => Box::new(SpatiallySmoothed::new(
            "sps-esprit",
            options.smoothing_subarray,
            {
                let spacing = geometry.spacing();
                move |_| Box::new(Esprit::new(spacing)) as Box<dyn SubspaceMethod>
            },
        )),
        _ => return Err(DoaError::UnknownEstimator(name.to_string())),
    };
    Ok(method)
}

pub fn canonical_method_list(raw: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for name in METHOD_ORDER {
        if raw.iter().any(|m| m == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Maps the phase of `exp(-j 2 pi d sin(theta))` back to theta [deg].
pub(crate) fn phase_to_angle_deg(phase: f64, spacing: f64) -> f64 {
    let sin_theta = (-phase / (2.0 * std::f64::consts::PI * spacing)).clamp(-1.0, 1.0);
    sin_theta.asin().to_degrees()
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::config::{SignalMode, SystemModelParams};
    use crate::signal::Synthesizer;
    use crate::system_model::SystemModel;

    use super::*;

    /// Covariance of a near-noiseless scenario.
    pub fn clean_covariance(
        sensors: usize,
        angles: &[f64],
        mode: SignalMode,
        seed: u64,
    ) -> (SystemModel, DMatrix<Complex64>) {
        let model = SystemModel::new(SystemModelParams {
            sensors,
            sources: angles.len(),
            snapshots: 2000,
            snr_db: 60.0,
            mode,
            ..Default::default()
        })
        .expect("valid model");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cov = Synthesizer::new(&model)
            .covariance(angles, &mut rng)
            .expect("synthesis");
        (model, cov)
    }
}
