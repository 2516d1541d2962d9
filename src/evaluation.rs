//! Scores an estimator over a dataset.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::criterion::Criterion;
use crate::dataset::Dataset;
use crate::methods::SubspaceMethod;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub method: String,
    pub criterion: Criterion,
    pub samples: usize,
    pub scored: usize,
    pub failed: usize,
    pub degenerate: usize,
    /// Mean score over scored samples [deg for rmspe, deg^2 for mspe]
    pub mean_score: f64,
    pub peak_score: f64,
    pub failure_rate: f64,
    pub avg_estimate_us: f64,
}

#[derive(Debug, Default, Clone)]
pub struct ScoreAccumulator {
    sum: f64,
    peak: f64,
    scored: usize,
    failed: usize,
    degenerate: usize,
    elapsed: Duration,
    timed: usize,
}

impl ScoreAccumulator {
    pub fn observe(&mut self, score: f64, degenerate: bool) {
        self.sum += score;
        self.peak = self.peak.max(score);
        self.scored += 1;
        if degenerate {
            self.degenerate += 1;
        }
    }

    pub fn observe_failure(&mut self) {
        self.failed += 1;
    }

    pub fn observe_time(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        self.timed += 1;
    }

    pub fn finalize(&self, method: &str, criterion: Criterion) -> EvaluationSummary {
        let samples = self.scored + self.failed;
        let mean_score = if self.scored > 0 {
            self.sum / self.scored as f64
        } else {
            f64::NAN
        };
        let failure_rate = if samples > 0 {
            self.failed as f64 / samples as f64
        } else {
            0.0
        };
        let avg_estimate_us = if self.timed > 0 {
            self.elapsed.as_secs_f64() * 1e6 / self.timed as f64
        } else {
            0.0
        };
        EvaluationSummary {
            method: method.to_string(),
            criterion,
            samples,
            scored: self.scored,
            failed: self.failed,
            degenerate: self.degenerate,
            mean_score,
            peak_score: self.peak,
            failure_rate,
            avg_estimate_us,
        }
    }
}

/// Runs `method` on every sample of `dataset`.
///
/// A sample whose estimate or score fails is logged, counted and skipped;
/// degenerate estimates are scored with the missing-source penalty.
pub fn evaluate(
    method: &dyn SubspaceMethod,
    dataset: &Dataset,
    sources: usize,
    criterion: Criterion,
) -> EvaluationSummary {
    let mut acc = ScoreAccumulator::default();

    for (index, sample) in dataset.samples.iter().enumerate() {
        let start = Instant::now();
        let outcome = method.estimate(&sample.covariance, sources);
        acc.observe_time(start.elapsed());

        let scored = outcome.and_then(|est| {
            let score = criterion.score(&sample.angles_deg, &est.angles_deg)?;
            Ok((score, !est.is_complete()))
        });
        match scored {
            Ok((score, degenerate)) => acc.observe(score, degenerate),
            Err(err) => {
                tracing::warn!(method = method.name(), sample = index, error = %err, "sample skipped");
                acc.observe_failure();
            }
        }
    }

    let summary = acc.finalize(method.name(), criterion);
    tracing::info!(
        method = %summary.method,
        criterion = criterion.label(),
        mean = summary.mean_score,
        peak = summary.peak_score,
        failed = summary.failed,
        degenerate = summary.degenerate,
        "evaluation finished"
    );
    summary
}
