use thiserror::Error;

#[derive(Debug, Error)]
pub enum DoaError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("spectrum has {found} peaks but {expected} sources were requested")]
    DegenerateSpectrum { expected: usize, found: usize },
    #[error("smoothed covariance has rank {rank}, below the source count {sources}")]
    InsufficientRank { rank: usize, sources: usize },
    #[error(
        "could not draw {sources} angles separated by {min_gap_deg} deg after {attempts} attempts"
    )]
    ResampleExhausted {
        sources: usize,
        min_gap_deg: f64,
        attempts: usize,
    },
    #[error("{estimator} needs at least {required} sensors, got {sensors}")]
    TooFewSensors {
        estimator: &'static str,
        required: usize,
        sensors: usize,
    },
    #[error("numerical failure: {0}")]
    Numerical(&'static str),
    #[error("unknown estimator '{0}'")]
    UnknownEstimator(String),
    #[error("{context} shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("dataset '{0}' not found in store")]
    MissingDataset(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DoaError>;
