//! Spatial-smoothing wrappers (SPS-MUSIC, SPS-root-MUSIC, SPS-ESPRIT)
//!
//! Coherent sources leave the source covariance singular. Averaging the
//! covariances of the `N - L + 1` overlapping L-element subarrays restores
//! rank `min(N - L + 1, M)`, after which the base estimator runs on the
//! L-element subarray.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{DoaError, Result};
use crate::linalg::{check_square, hermitian_eigen, numerical_rank, spatial_smoothing};
use crate::methods::{EstimationResult, SubspaceMethod};

/// Eigenvalues below this fraction of the largest do not count towards rank.
const RANK_REL_TOL: f64 = 1e-10;

type BaseFactory = Box<dyn Fn(usize) -> Box<dyn SubspaceMethod>>;

pub struct SpatiallySmoothed {
    name: &'static str,
    subarray: Option<usize>,
    /// Builds the base estimator for a given subarray length.
    base: BaseFactory,
}

impl SpatiallySmoothed {
    pub fn new(
        name: &'static str,
        subarray: Option<usize>,
        base: impl Fn(usize) -> Box<dyn SubspaceMethod> + 'static,
    ) -> Self {
        Self {
            name,
            subarray,
            base: Box::new(base),
        }
    }

    fn subarray_len(&self, sources: usize) -> usize {
        self.subarray.unwrap_or(sources + 1)
    }

    /// Smoothed covariance, checked to carry at least `sources` signal dimensions.
    pub fn smooth(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<DMatrix<Complex64>> {
        let n = check_square(covariance)?;
        let len = self.subarray_len(sources);
        if len > n {
            return Err(DoaError::TooFewSensors {
                estimator: self.name,
                required: len,
                sensors: n,
            });
        }

        let smoothed = spatial_smoothing(covariance, len)?;
        let (eigenvalues, _) = hermitian_eigen(&smoothed)?;
        let subarrays = n - len + 1;
        let rank = numerical_rank(&eigenvalues, RANK_REL_TOL).min(subarrays);
        if rank < sources {
            return Err(DoaError::InsufficientRank { rank, sources });
        }
        Ok(smoothed)
    }
}

impl SubspaceMethod for SpatiallySmoothed {
    fn name(&self) -> &'static str {
        self.name
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        let smoothed = self.smooth(covariance, sources)?;
        let base = (self.base)(smoothed.nrows());
        base.estimate(&smoothed, sources)
    }
}
