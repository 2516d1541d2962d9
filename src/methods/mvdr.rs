//! MVDR (Capon) spectrum `1 / (a^H R^-1 a)` with the same peak picking as MUSIC.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{DoaError, Result};
use crate::linalg::check_square;
use crate::methods::{angle_grid, pick_peaks, EstimationResult, MethodOptions, SubspaceMethod};
use crate::system_model::ArrayGeometry;

pub struct Mvdr {
    geometry: ArrayGeometry,
    grid_deg: Vec<f64>,
    keep_spectrum: bool,
}

impl Mvdr {
    pub fn new(geometry: ArrayGeometry, options: &MethodOptions) -> Self {
        Self {
            geometry,
            grid_deg: angle_grid(options.grid_step_deg),
            keep_spectrum: options.keep_spectrum,
        }
    }
}

impl SubspaceMethod for Mvdr {
    fn name(&self) -> &'static str {
        "mvdr"
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        let n = check_square(covariance)?;
        if n != self.geometry.sensors() {
            return Err(DoaError::ShapeMismatch {
                context: "mvdr covariance",
                expected: self.geometry.sensors(),
                got: n,
            });
        }
        let inverse = covariance
            .clone()
            .try_inverse()
            .ok_or(DoaError::Numerical("covariance is singular"))?;

        let values = self
            .grid_deg
            .iter()
            .map(|&angle| {
                let a = self.geometry.steering_vector(angle);
                let power = a.dotc(&(&inverse * &a)).re;
                1.0 / power.max(f64::MIN_POSITIVE)
            })
            .collect();
        Ok(pick_peaks(
            "mvdr",
            self.grid_deg.clone(),
            values,
            sources,
            self.keep_spectrum,
        ))
    }
}
