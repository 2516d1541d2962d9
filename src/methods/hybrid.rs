//! Learned-subspace boundary
//!
//! A trained network is an opaque map from an observed covariance to a
//! surrogate covariance whose eigenstructure the classical estimators can
//! read. `HybridMethod` chains such an extractor with any `SubspaceMethod`.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{DoaError, Result};
use crate::linalg::check_square;
use crate::methods::{EstimationResult, SubspaceMethod};

pub trait SubspaceExtractor {
    fn extract(&self, covariance: &DMatrix<Complex64>) -> Result<DMatrix<Complex64>>;
}

impl<F> SubspaceExtractor for F
where
    F: Fn(&DMatrix<Complex64>) -> Result<DMatrix<Complex64>>,
{
    fn extract(&self, covariance: &DMatrix<Complex64>) -> Result<DMatrix<Complex64>> {
        self(covariance)
    }
}

pub struct HybridMethod {
    name: &'static str,
    extractor: Box<dyn SubspaceExtractor>,
    backend: Box<dyn SubspaceMethod>,
}

impl HybridMethod {
    pub fn new(
        name: &'static str,
        extractor: impl SubspaceExtractor + 'static,
        backend: Box<dyn SubspaceMethod>,
    ) -> Self {
        Self {
            name,
            extractor: Box::new(extractor),
            backend,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl SubspaceMethod for HybridMethod {
    fn name(&self) -> &'static str {
        self.name
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        let n = check_square(covariance)?;
        let surrogate = self.extractor.extract(covariance)?;
        let m = check_square(&surrogate)?;
        if m != n {
            return Err(DoaError::ShapeMismatch {
                context: "extracted covariance",
                expected: n,
                got: m,
            });
        }
        self.backend.estimate(&surrogate, sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalMode;
    use crate::criterion::rmspe;
    use crate::methods::esprit::Esprit;
    use crate::methods::test_support::clean_covariance;
    use crate::system_model::ArrayGeometry;

    #[test]
    fn identity_extractor_matches_backend() {
        let truth = [-25.0, 10.0];
        let (model, cov) = clean_covariance(8, &truth, SignalMode::NonCoherent, 21);
        let spacing = model.params().spacing;

        let plain = Esprit::new(spacing).estimate(&cov, 2).expect("estimate");
        let hybrid = HybridMethod::new(
            "passthrough-esprit",
            |c: &DMatrix<Complex64>| -> Result<DMatrix<Complex64>> { Ok(c.clone()) },
            Box::new(Esprit::new(spacing)),
        );
        assert_eq!(hybrid.name(), "passthrough-esprit");
        assert_eq!(hybrid.backend_name(), "esprit");
        let est = hybrid.estimate(&cov, 2).expect("estimate");
        assert_eq!(est.angles_deg, plain.angles_deg);
    }

    #[test]
    fn extractor_output_drives_the_estimate() {
        // An "oracle" extractor that ignores its input and returns a clean
        // rank-two covariance for fixed directions.
        let geometry = ArrayGeometry::uniform(8, 0.5);
        let oracle_angles = [-40.0, 35.0];
        let a = geometry.manifold_at(&oracle_angles, 1.0);
        let oracle = &a * a.adjoint() + DMatrix::<Complex64>::identity(8, 8) * Complex64::new(1e-6, 0.0);

        let hybrid = HybridMethod::new(
            "oracle-esprit",
            move |_: &DMatrix<Complex64>| -> Result<DMatrix<Complex64>> { Ok(oracle.clone()) },
            Box::new(Esprit::new(0.5)),
        );
        let noise_only = DMatrix::<Complex64>::identity(8, 8);
        let est = hybrid.estimate(&noise_only, 2).expect("estimate");
        assert!(rmspe(&oracle_angles, &est.angles_deg).expect("score") < 1e-3);
    }

    #[test]
    fn extractor_shape_is_checked() {
        let hybrid = HybridMethod::new(
            "shrinking",
            |_: &DMatrix<Complex64>| -> Result<DMatrix<Complex64>> {
                Ok(DMatrix::<Complex64>::identity(3, 3))
            },
            Box::new(Esprit::new(0.5)),
        );
        let cov = DMatrix::<Complex64>::identity(6, 6);
        assert!(matches!(
            hybrid.estimate(&cov, 1),
            Err(DoaError::ShapeMismatch { expected: 6, got: 3, .. })
        ));
    }

    #[test]
    fn extractor_errors_propagate() {
        let hybrid = HybridMethod::new(
            "failing",
            |_: &DMatrix<Complex64>| -> Result<DMatrix<Complex64>> {
                Err(DoaError::Numerical("model not loaded"))
            },
            Box::new(Esprit::new(0.5)),
        );
        let cov = DMatrix::<Complex64>::identity(4, 4);
        assert!(matches!(hybrid.estimate(&cov, 1), Err(DoaError::Numerical(_))));
    }
}
