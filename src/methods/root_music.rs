//! Root-MUSIC for uniform linear arrays
//!
//! The MUSIC denominator `a^H U_n U_n^H a` is a polynomial in
//! `z = exp(-j 2 pi d sin(theta))` whose coefficients are the diagonal sums
//! of the noise projector. Its roots are found as eigenvalues of the
//! companion matrix; the roots inside (or on) the unit circle that lie
//! closest to it give the source angles.

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::Result;
use crate::linalg::{general_eigenvalues, split_subspaces};
use crate::methods::{phase_to_angle_deg, EstimationResult, SubspaceMethod};

/// Two candidate roots closer than this are treated as the same source [deg].
const DUPLICATE_ROOT_DEG: f64 = 1e-2;

pub struct RootMusic {
    spacing: f64,
}

impl RootMusic {
    pub fn new(spacing: f64) -> Self {
        Self { spacing }
    }
}

/// Polynomial coefficients, lowest degree first, of `z^(N-1) a^H C a`.
///
/// Coefficient `k + N - 1` is the sum of the k-th diagonal of `C`
/// (k > 0 above the main diagonal).
pub fn projector_polynomial(projector: &DMatrix<Complex64>) -> Vec<Complex64> {
    let n = projector.nrows();
    let mut coeffs = vec![Complex64::new(0.0, 0.0); 2 * n - 1];
    for row in 0..n {
        for col in 0..n {
            let k = col as isize - row as isize + n as isize - 1;
            coeffs[k as usize] += projector[(row, col)];
        }
    }
    coeffs
}

/// Roots of a polynomial (lowest degree first) via its companion matrix.
pub fn polynomial_roots(coeffs: &[Complex64]) -> Result<Vec<Complex64>> {
    let scale = coeffs.iter().map(|c| c.norm()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Ok(Vec::new());
    }
    // Negligible leading coefficients lower the degree.
    let mut degree = coeffs.len() - 1;
    while degree > 0 && coeffs[degree].norm() <= scale * 1e-14 {
        degree -= 1;
    }
    if degree == 0 {
        return Ok(Vec::new());
    }

    let lead = coeffs[degree];
    let mut companion = DMatrix::<Complex64>::zeros(degree, degree);
    for j in 0..degree {
        companion[(0, j)] = -coeffs[degree - 1 - j] / lead;
    }
    for i in 1..degree {
        companion[(i, i - 1)] = Complex64::new(1.0, 0.0);
    }
    general_eigenvalues(companion)
}

/// Chooses up to `sources` angles from polynomial roots.
///
/// Roots with |z| <= 1 are ordered by distance to the unit circle; equal
/// distances are broken by the smaller angle. Candidates within
/// `DUPLICATE_ROOT_DEG` of an already chosen angle are skipped.
pub fn select_roots(roots: &[Complex64], sources: usize, spacing: f64) -> Vec<f64> {
    let mut candidates: Vec<(f64, f64)> = roots
        .iter()
        .filter(|z| z.norm() <= 1.0 && z.norm() > 0.0)
        .map(|z| (1.0 - z.norm(), phase_to_angle_deg(z.arg(), spacing)))
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut chosen: Vec<f64> = Vec::with_capacity(sources);
    for (_, angle) in candidates {
        if chosen.len() == sources {
            break;
        }
        if chosen
            .iter()
            .all(|c: &f64| (c - angle).abs() > DUPLICATE_ROOT_DEG)
        {
            chosen.push(angle);
        }
    }
    chosen
}

impl SubspaceMethod for RootMusic {
    fn name(&self) -> &'static str {
        "r-music"
    }

    fn estimate(&self, covariance: &DMatrix<Complex64>, sources: usize) -> Result<EstimationResult> {
        let split = split_subspaces(covariance, sources, "r-music")?;
        let projector = &split.noise * split.noise.adjoint();
        let roots = polynomial_roots(&projector_polynomial(&projector))?;
        let found = select_roots(&roots, sources, self.spacing);
        if found.len() < sources {
            tracing::warn!(
                found = found.len(),
                sources,
                "root-music found too few roots, missing sources reported as NaN"
            );
        }
        Ok(EstimationResult::from_candidates(found, sources, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalMode;
    use crate::methods::test_support::clean_covariance;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn roots_of_quadratic() {
        // (z - 2)(z + 0.5) = z^2 - 1.5 z - 1
        let roots = polynomial_roots(&[c(-1.0, 0.0), c(-1.5, 0.0), c(1.0, 0.0)]).expect("roots");
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().any(|r| (r - c(2.0, 0.0)).norm() < 1e-10));
        assert!(roots.iter().any(|r| (r - c(-0.5, 0.0)).norm() < 1e-10));
    }

    #[test]
    fn vanishing_leading_coefficient_lowers_degree() {
        let roots = polynomial_roots(&[c(-3.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)]).expect("roots");
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - c(3.0, 0.0)).norm() < 1e-10);
    }

    #[test]
    fn equal_distance_roots_prefer_smaller_angle() {
        // Exactly equal moduli: +30 deg and -30 deg for half-wavelength spacing.
        let plus_30 = c(0.0, -0.5);
        let minus_30 = c(0.0, 0.5);
        let outside = Complex64::from_polar(1.05, 0.1);
        let chosen = select_roots(&[plus_30, outside, minus_30], 1, 0.5);
        assert_eq!(chosen.len(), 1);
        assert!((chosen[0] + 30.0).abs() < 1e-9);

        let both = select_roots(&[plus_30, minus_30], 2, 0.5);
        assert!((both[0] + 30.0).abs() < 1e-9);
        assert!((both[1] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn closer_root_wins_and_duplicates_are_skipped() {
        let spacing = 0.5;
        let near = Complex64::from_polar(0.999, 0.3);
        let twin = Complex64::from_polar(0.998, 0.3 + 1e-7);
        let far = Complex64::from_polar(0.7, -1.0);
        let chosen = select_roots(&[far, twin, near], 2, spacing);
        assert_eq!(chosen.len(), 2);
        assert!((chosen[0] - phase_to_angle_deg(0.3, spacing)).abs() < 1e-4);
        assert!((chosen[1] - phase_to_angle_deg(-1.0, spacing)).abs() < 1e-9);
    }

    #[test]
    fn recovers_two_sources_at_high_snr() {
        let truth = [-10.0, 20.0];
        let (model, cov) = clean_covariance(8, &truth, SignalMode::NonCoherent, 4);
        let est = RootMusic::new(model.params().spacing)
            .estimate(&cov, 2)
            .expect("estimate");
        assert!(est.is_complete());
        for (e, t) in est.angles_deg.iter().zip(truth.iter()) {
            assert!((e - t).abs() < 0.5, "estimate {e} vs {t}");
        }
    }
}
