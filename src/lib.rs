//! Subspace direction-of-arrival estimation on synthetic array data.
//!
//! A uniform linear array model with optional calibration error, a signal
//! synthesizer for narrowband and broadband sources (coherent or not), a
//! dataset builder, the classical subspace estimators (MUSIC, root-MUSIC,
//! ESPRIT, MVDR and their spatially smoothed variants), permutation- and
//! wrap-invariant angular scoring, and the evaluation harness used by the
//! `doa-bench` binary.

pub mod config;
pub mod criterion;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod linalg;
pub mod methods;
pub mod signal;
pub mod store;
pub mod system_model;

pub use config::{ExperimentConfig, Scenario, SignalMode, SystemModelParams};
pub use criterion::{mspe, rmspe, Criterion};
pub use dataset::{Dataset, DatasetBuilder, Sample, Split};
pub use error::{DoaError, Result};
pub use evaluation::{evaluate, EvaluationSummary};
pub use methods::{build_method, EstimationResult, SubspaceMethod};
pub use signal::Synthesizer;
pub use system_model::{ArrayGeometry, SystemModel};
