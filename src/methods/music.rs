//! MUSIC (MUltiple SIgnal Classification)
//!
//! Grid search of the pseudo-spectrum `1 / ||U_n^H a(theta)||^2`, where `U_n`
//! spans the noise subspace of the covariance.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{DoaError, Result};
use crate::linalg::split_subspaces;
use crate::methods::{angle_grid, pick_peaks, EstimationResult, MethodOptions, SubspaceMethod};
use crate::system_model::ArrayGeometry;

pub struct Music {
    geometry: ArrayGeometry,
    grid_deg: Vec<f64>,
    keep_spectrum: bool,
}

impl Music {
    pub fn new(geometry: ArrayGeometry, options: &MethodOptions) -> Self {
        Self {
            geometry,
            grid_deg: angle_grid(options.grid_step_deg),
            keep_spectrum: options.keep_spectrum,
        }
    }

    /// Pseudo-spectrum over the estimator's grid for a given noise subspace.
    pub fn pseudospectrum(&self, noise: &DMatrix<Complex64>) -> Vec<f64> {
        self.grid_deg
            .iter()
            .map(|&angle| {
                let a = self.geometry.steering_vector(angle);
                let denom = noise.ad_mul(&a).norm_squared();
                1.0 / denom.max(f64::MIN_POSITIVE)
            })
            .collect()
    }
}

impl SubspaceMethod for Music {
    fn name(&self) -> &'static str {
        "music"
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        if covariance.nrows() != self.geometry.sensors() {
            return Err(DoaError::ShapeMismatch {
                context: "music covariance",
                expected: self.geometry.sensors(),
                got: covariance.nrows(),
            });
        }
        let split = split_subspaces(covariance, sources, "music")?;
        let values = self.pseudospectrum(&split.noise);
        Ok(pick_peaks(
            "music",
            self.grid_deg.clone(),
            values,
            sources,
            self.keep_spectrum,
        ))
    }
}
