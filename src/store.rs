//! Keyed dataset persistence
//!
//! Generated datasets are addressed by the parameters that produced them,
//! so a run can reuse an earlier dataset instead of resynthesizing it.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SystemModelParams;
use crate::dataset::{Dataset, Split};
use crate::error::{DoaError, Result};

/// Everything that determines the content of a generated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetKey {
    pub params: SystemModelParams,
    pub min_gap_deg: f64,
    pub keep_snapshots: bool,
    pub split: Split,
    pub samples: usize,
    pub seed: u64,
}

impl DatasetKey {
    pub fn new(
        params: &SystemModelParams,
        min_gap_deg: f64,
        keep_snapshots: bool,
        split: Split,
        samples: usize,
        seed: u64,
    ) -> Self {
        Self {
            params: params.clone(),
            min_gap_deg,
            keep_snapshots,
            split,
            samples,
            seed,
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        write!(
            f,
            "{}_{}_N{}_M{}_T{}_snr{}_d{}_eta{}_geo_noise_var{}_cal{}_F{}_gap{}_{}_{}_{}_seed{}",
            p.scenario.label(),
            p.mode.label(),
            p.sensors,
            p.sources,
            p.snapshots,
            p.snr_db,
            p.spacing,
            p.eta,
            p.geo_noise_var,
            p.calibration_seed,
            p.max_freq,
            self.min_gap_deg,
            if self.keep_snapshots { "snap" } else { "cov" },
            self.split,
            self.samples,
            self.seed
        )
    }
}

pub trait DatasetStore {
    fn put(&mut self, key: &DatasetKey, dataset: &Dataset) -> Result<()>;
    fn get(&self, key: &DatasetKey) -> Result<Dataset>;
    fn contains(&self, key: &DatasetKey) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: HashMap<String, Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetStore for MemoryStore {
    fn put(&mut self, key: &DatasetKey, dataset: &Dataset) -> Result<()> {
        self.datasets.insert(key.to_string(), dataset.clone());
        Ok(())
    }

    fn get(&self, key: &DatasetKey) -> Result<Dataset> {
        self.datasets
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| DoaError::MissingDataset(key.to_string()))
    }

    fn contains(&self, key: &DatasetKey) -> bool {
        self.datasets.contains_key(&key.to_string())
    }
}

/// One pretty-printed JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &DatasetKey) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl DatasetStore for JsonDirStore {
    fn put(&mut self, key: &DatasetKey, dataset: &Dataset) -> Result<()> {
        let path = self.path_for(key);
        let payload = serde_json::to_string_pretty(dataset)?;
        fs::write(&path, payload)?;
        tracing::debug!(path = %path.display(), samples = dataset.len(), "dataset stored");
        Ok(())
    }

    fn get(&self, key: &DatasetKey) -> Result<Dataset> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(DoaError::MissingDataset(key.to_string()));
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn contains(&self, key: &DatasetKey) -> bool {
        self.path_for(key).exists()
    }
}
