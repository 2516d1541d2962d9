//! Dataset generation
//!
//! Draws well-separated source angles, synthesizes one observation per
//! sample and keeps the covariance (and optionally the raw snapshots)
//! together with the ground truth.

use std::fmt;

use nalgebra::DMatrix;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::SystemModelParams;
use crate::error::{DoaError, Result};
use crate::signal::{sample_covariance, Synthesizer};
use crate::system_model::SystemModel;

pub const DEFAULT_MAX_ATTEMPTS: usize = 100_000;

/// Period of the DOA domain used for the separation check [deg].
const DOA_PERIOD_DEG: f64 = 180.0;

const TRAIN_STREAM: u64 = 1;
const TEST_STREAM: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Test => f.write_str("test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// True angles [deg], ascending.
    pub angles_deg: Vec<f64>,
    pub covariance: DMatrix<Complex64>,
    pub snapshots: Option<DMatrix<Complex64>>,
    pub snr_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub split: Split,
    pub params: SystemModelParams,
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn circular_gap_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).abs().rem_euclid(DOA_PERIOD_DEG);
    d.min(DOA_PERIOD_DEG - d)
}

/// Draws `sources` angles uniformly in [-90, 90) deg on a 0.01 deg lattice,
/// sorted ascending, with every pair at least `min_gap_deg` apart.
pub fn draw_angles(
    sources: usize,
    min_gap_deg: f64,
    max_attempts: usize,
    rng: &mut impl Rng,
) -> Result<Vec<f64>> {
    for attempt in 0..max_attempts {
        let mut angles: Vec<f64> = (0..sources)
            .map(|_| rng.gen_range(-9000i32..9000) as f64 / 100.0)
            .collect();
        angles.sort_by(|a, b| a.total_cmp(b));

        let separated = angles.iter().enumerate().all(|(i, &a)| {
            angles[i + 1..]
                .iter()
                .all(|&b| circular_gap_deg(a, b) >= min_gap_deg)
        });
        if separated {
            if attempt > 0 {
                tracing::debug!(attempt, sources, min_gap_deg, "angles resampled");
            }
            return Ok(angles);
        }
    }
    Err(DoaError::ResampleExhausted {
        sources,
        min_gap_deg,
        attempts: max_attempts,
    })
}

/// Lagged empirical autocorrelations `R_k = sum_t x(t+k) x(t)^H / (T-k)` for
/// `k = 0..tau`.
pub fn autocorrelation_lags(snapshots: &DMatrix<Complex64>, tau: usize) -> Result<Vec<DMatrix<Complex64>>> {
    let t = snapshots.ncols();
    if tau > t {
        return Err(DoaError::ShapeMismatch {
            context: "autocorrelation lags",
            expected: t,
            got: tau,
        });
    }
    let lags = (0..tau)
        .map(|lag| {
            let width = t - lag;
            let lead = snapshots.columns(lag, width);
            let base = snapshots.columns(0, width);
            lead * base.adjoint() / Complex64::new(width as f64, 0.0)
        })
        .collect();
    Ok(lags)
}

pub struct DatasetBuilder<'a> {
    model: &'a SystemModel,
    min_gap_deg: f64,
    max_attempts: usize,
    keep_snapshots: bool,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(model: &'a SystemModel, min_gap_deg: f64) -> Self {
        Self {
            model,
            min_gap_deg,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            keep_snapshots: false,
        }
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn keep_snapshots(mut self, keep: bool) -> Self {
        self.keep_snapshots = keep;
        self
    }

    pub fn build(&self, count: usize, split: Split, rng: &mut impl Rng) -> Result<Dataset> {
        let params = self.model.params();
        let synth = Synthesizer::new(self.model);
        let mut samples = Vec::with_capacity(count);

        for _ in 0..count {
            let angles_deg = draw_angles(params.sources, self.min_gap_deg, self.max_attempts, rng)?;
            let obs = synth.observe(&angles_deg, rng)?;
            let covariance = sample_covariance(&obs.snapshots);
            samples.push(Sample {
                angles_deg,
                covariance,
                snapshots: self.keep_snapshots.then_some(obs.snapshots),
                snr_db: params.snr_db,
            });
        }

        tracing::debug!(
            %split,
            samples = samples.len(),
            sensors = params.sensors,
            sources = params.sources,
            "dataset built"
        );
        Ok(Dataset {
            split,
            params: params.clone(),
            samples,
        })
    }

    /// One split drawn from its own stream of `seed`; the train and test
    /// streams never overlap.
    pub fn build_split(&self, count: usize, split: Split, seed: u64) -> Result<Dataset> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(match split {
            Split::Train => TRAIN_STREAM,
            Split::Test => TEST_STREAM,
        });
        self.build(count, split, &mut rng)
    }

    /// Train and test datasets from independent streams of one seed.
    pub fn build_splits(&self, train: usize, test: usize, seed: u64) -> Result<(Dataset, Dataset)> {
        let train_set = self.build_split(train, Split::Train, seed)?;
        let test_set = self.build_split(test, Split::Test, seed)?;
        Ok((train_set, test_set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model() -> SystemModel {
        SystemModel::new(SystemModelParams {
            sensors: 6,
            sources: 2,
            snapshots: 40,
            ..Default::default()
        })
        .expect("valid model")
    }

    #[test]
    fn drawn_angles_respect_minimum_gap() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let gap = 15.0;
        for _ in 0..10_000 {
            let angles = draw_angles(3, gap, DEFAULT_MAX_ATTEMPTS, &mut rng).expect("feasible");
            assert_eq!(angles.len(), 3);
            assert!(angles.windows(2).all(|w| w[0] <= w[1]));
            for i in 0..angles.len() {
                assert!((-90.0..90.0).contains(&angles[i]));
                for j in i + 1..angles.len() {
                    assert!(circular_gap_deg(angles[i], angles[j]) >= gap);
                }
            }
        }
    }

    #[test]
    fn separation_wraps_around_endfire() {
        assert!((circular_gap_deg(-89.0, 89.0) - 2.0).abs() < 1e-9);
        assert!((circular_gap_deg(-10.0, 20.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn infeasible_gap_exhausts_attempts() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = draw_angles(4, 60.0, 500, &mut rng);
        assert!(matches!(
            err,
            Err(DoaError::ResampleExhausted {
                sources: 4,
                attempts: 500,
                ..
            })
        ));
    }

    #[test]
    fn builds_exact_sample_count() {
        let model = small_model();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ds = DatasetBuilder::new(&model, 10.0)
            .build(17, Split::Test, &mut rng)
            .expect("dataset");
        assert_eq!(ds.len(), 17);
        assert_eq!(ds.split, Split::Test);
        for s in &ds.samples {
            assert_eq!(s.covariance.shape(), (6, 6));
            assert!(s.snapshots.is_none());
            assert_eq!(s.angles_deg.len(), 2);
        }
    }

    #[test]
    fn snapshots_kept_on_request() {
        let model = small_model();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let ds = DatasetBuilder::new(&model, 10.0)
            .keep_snapshots(true)
            .build(2, Split::Train, &mut rng)
            .expect("dataset");
        let snaps = ds.samples[0].snapshots.as_ref().expect("kept");
        assert_eq!(snaps.shape(), (6, 40));
    }

    #[test]
    fn splits_are_reproducible_and_independent() {
        let model = small_model();
        let builder = DatasetBuilder::new(&model, 10.0);
        let (train_a, test_a) = builder.build_splits(5, 5, 99).expect("splits");
        let (train_b, test_b) = builder.build_splits(5, 5, 99).expect("splits");
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_ne!(train_a.samples[0].angles_deg, test_a.samples[0].angles_deg);

        // Test split does not depend on how many training samples were drawn.
        let (_, test_c) = builder.build_splits(50, 5, 99).expect("splits");
        assert_eq!(test_a, test_c);

        // Building the test split alone gives the same data.
        let test_only = builder.build_split(5, Split::Test, 99).expect("split");
        assert_eq!(test_a, test_only);
    }

    #[test]
    fn zero_lag_autocorrelation_is_sample_covariance() {
        let model = small_model();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let obs = Synthesizer::new(&model)
            .observe(&[-20.0, 30.0], &mut rng)
            .expect("observe");
        let lags = autocorrelation_lags(&obs.snapshots, 4).expect("lags");
        assert_eq!(lags.len(), 4);
        assert!((&lags[0] - sample_covariance(&obs.snapshots)).norm() < 1e-9);
        assert!(autocorrelation_lags(&obs.snapshots, 41).is_err());
    }
}
