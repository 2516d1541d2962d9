//! ESPRIT (Estimation of Signal Parameters via Rotational Invariance)
//!
//! 1. Signal subspace `U_s` from the M dominant eigenvectors
//! 2. Maximally overlapping subarrays: rows `0..N-1` and `1..N` of `U_s`
//! 3. Least-squares rotation `Phi = U_s1^+ U_s2`
//! 4. Angles from the phases of the eigenvalues of `Phi`

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{DoaError, Result};
use crate::linalg::{general_eigenvalues, split_subspaces};
use crate::methods::{phase_to_angle_deg, EstimationResult, SubspaceMethod};

pub struct Esprit {
    spacing: f64,
}

impl Esprit {
    pub fn new(spacing: f64) -> Self {
        Self { spacing }
    }
}

impl SubspaceMethod for Esprit {
    fn name(&self) -> &'static str {
        "esprit"
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        let split = split_subspaces(covariance, sources, "esprit")?;
        let n = split.signal.nrows();

        let upper = split.signal.rows(0, n - 1).into_owned();
        let lower = split.signal.rows(1, n - 1).into_owned();
        let pinv = upper
            .pseudo_inverse(1e-12)
            .map_err(|_| DoaError::Numerical("esprit subarray pseudo-inverse failed"))?;
        let phi = pinv * lower;

        let angles = general_eigenvalues(phi)?
            .iter()
            .map(|z| phase_to_angle_deg(z.arg(), self.spacing))
            .collect();
        Ok(EstimationResult::from_candidates(angles, sources, None))
    }
}
