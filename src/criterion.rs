//! Angular error scoring
//!
//! Estimates carry no source labels, so the error of an estimate is the
//! smallest mean squared wrapped difference over all assignments of
//! estimates to true angles.

use serde::{Deserialize, Serialize};

use crate::error::{DoaError, Result};

/// Exhaustive permutation search is limited to this many sources (8! pairings).
pub const MAX_EXHAUSTIVE_SOURCES: usize = 8;

/// Error charged for a missing (NaN) estimate [deg].
pub const MISSING_ESTIMATE_PENALTY_DEG: f64 = 180.0;

/// Maps an angle difference into [-180, 180) degrees.
pub fn wrap_deg(x: f64) -> f64 {
    (x + 180.0).rem_euclid(360.0) - 180.0
}

fn pair_error_sq(truth: f64, estimate: f64) -> f64 {
    let err = if estimate.is_nan() {
        MISSING_ESTIMATE_PENALTY_DEG
    } else {
        wrap_deg(estimate - truth)
    };
    err * err
}

/// Mean squared periodic error [deg^2], minimised over permutations of `estimate`.
pub fn mspe(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    if truth.len() != estimate.len() {
        return Err(DoaError::ShapeMismatch {
            context: "scored angles",
            expected: truth.len(),
            got: estimate.len(),
        });
    }
    let m = truth.len();
    if m == 0 {
        return Ok(0.0);
    }
    if m > MAX_EXHAUSTIVE_SOURCES {
        return Err(DoaError::Configuration(format!(
            "permutation search supports at most {MAX_EXHAUSTIVE_SOURCES} sources, got {m}"
        )));
    }

    // Pairwise costs once, then Heap's algorithm over assignments.
    let cost: Vec<Vec<f64>> = truth
        .iter()
        .map(|&t| estimate.iter().map(|&e| pair_error_sq(t, e)).collect())
        .collect();
    let assignment_cost =
        |perm: &[usize]| -> f64 { perm.iter().enumerate().map(|(i, &j)| cost[i][j]).sum() };

    let mut perm: Vec<usize> = (0..m).collect();
    let mut best = assignment_cost(&perm);
    let mut counters = vec![0usize; m];
    let mut i = 1;
    while i < m {
        if counters[i] < i {
            if i % 2 == 0 {
                perm.swap(0, i);
            } else {
                perm.swap(counters[i], i);
            }
            best = best.min(assignment_cost(&perm));
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
    Ok(best / m as f64)
}

/// Root mean squared periodic error [deg].
pub fn rmspe(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    Ok(mspe(truth, estimate)?.sqrt())
}

/// Score reported by the evaluation harness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    #[default]
    Rmspe,
    Mspe,
}

impl Criterion {
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Rmspe => "rmspe",
            Criterion::Mspe => "mspe",
        }
    }

    pub fn score(&self, truth: &[f64], estimate: &[f64]) -> Result<f64> {
        match self {
            Criterion::Rmspe => rmspe(truth, estimate),
            Criterion::Mspe => mspe(truth, estimate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_angles_score_zero() {
        let t = [-42.5, 3.0, 71.25];
        assert_eq!(rmspe(&t, &t).expect("score"), 0.0);
    }

    #[test]
    fn wrap_crosses_the_seam() {
        assert!((rmspe(&[179.0], &[-179.0]).expect("score") - 2.0).abs() < 1e-12);
        assert_eq!(wrap_deg(180.0), -180.0);
        assert_eq!(wrap_deg(-180.0), -180.0);
        assert!((wrap_deg(370.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn best_assignment_is_used() {
        let truth = [-30.0, 40.0];
        let swapped = [41.0, -29.0];
        assert!((rmspe(&truth, &swapped).expect("score") - 1.0).abs() < 1e-12);
        assert!((mspe(&truth, &swapped).expect("score") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn nan_estimate_costs_the_maximum_error() {
        let score = mspe(&[10.0, 20.0], &[10.0, f64::NAN]).expect("score");
        assert!((score - 180.0 * 180.0 / 2.0).abs() < 1e-9);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            rmspe(&[1.0, 2.0], &[1.0]),
            Err(DoaError::ShapeMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn too_many_sources_is_rejected() {
        let t = vec![0.0; MAX_EXHAUSTIVE_SOURCES + 1];
        assert!(matches!(rmspe(&t, &t), Err(DoaError::Configuration(_))));
    }

    #[test]
    fn criterion_selects_measure() {
        let truth = [0.0, 10.0];
        let est = [2.0, 12.0];
        assert!((Criterion::Mspe.score(&truth, &est).expect("score") - 4.0).abs() < 1e-12);
        assert!((Criterion::Rmspe.score(&truth, &est).expect("score") - 2.0).abs() < 1e-12);
        assert_eq!(Criterion::default(), Criterion::Rmspe);
    }

    proptest! {
        #[test]
        fn prop_permutation_invariant(
            angles in proptest::collection::vec((-90.0f64..90.0, -90.0f64..90.0), 1..6),
            rotate in 0usize..6,
        ) {
            let truth: Vec<f64> = angles.iter().map(|p| p.0).collect();
            let est: Vec<f64> = angles.iter().map(|p| p.1).collect();
            let base = rmspe(&truth, &est).expect("score");

            let mut est_rot = est.clone();
            est_rot.rotate_left(rotate % est.len());
            let mut truth_rev = truth.clone();
            truth_rev.reverse();

            prop_assert!((rmspe(&truth, &est_rot).expect("score") - base).abs() < 1e-9);
            prop_assert!((rmspe(&truth_rev, &est).expect("score") - base).abs() < 1e-9);
        }

        #[test]
        fn prop_bounded_by_half_period(
            angles in proptest::collection::vec((-720.0f64..720.0, -720.0f64..720.0), 1..5),
        ) {
            let truth: Vec<f64> = angles.iter().map(|p| p.0).collect();
            let est: Vec<f64> = angles.iter().map(|p| p.1).collect();
            let score = rmspe(&truth, &est).expect("score");
            prop_assert!((0.0..=180.0).contains(&score));
        }
    }
}
