use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SystemModelParams;
use crate::evaluation::EvaluationSummary;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub scenario: String,
    pub mode: String,
    pub n: usize,
    pub m: usize,
    pub t: usize,
    pub snr_db: f64,
    pub eta: f64,
    pub seed: u64,
    pub summary: EvaluationSummary,
}

impl SummaryRow {
    pub fn new(params: &SystemModelParams, seed: u64, summary: EvaluationSummary) -> Self {
        Self {
            scenario: params.scenario.label().to_string(),
            mode: params.mode.label().to_string(),
            n: params.sensors,
            m: params.sources,
            t: params.snapshots,
            snr_db: params.snr_db,
            eta: params.eta,
            seed,
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub scenario: String,
    pub mode: String,
    pub methods: Vec<String>,
    pub snr_db: Vec<f64>,
    pub seed: u64,
    pub test_samples: usize,
    pub criterion: String,
    pub note: String,
}

fn fmt_f64(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{v:.10}")
    }
}

pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory: {}", outdir.display()))
}

pub fn write_summary_csv(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open summary.csv for writing: {}", path.display()))?;

    wtr.write_record([
        "method",
        "scenario",
        "mode",
        "N",
        "M",
        "T",
        "snr_db",
        "eta",
        "seed",
        "criterion",
        "samples",
        "failed",
        "degenerate",
        "mean_score",
        "peak_score",
        "failure_rate",
        "avg_estimate_us",
        "schema_version",
    ])?;

    for row in rows {
        let s = &row.summary;
        wtr.write_record([
            s.method.as_str(),
            row.scenario.as_str(),
            row.mode.as_str(),
            &row.n.to_string(),
            &row.m.to_string(),
            &row.t.to_string(),
            &fmt_f64(row.snr_db),
            &fmt_f64(row.eta),
            &row.seed.to_string(),
            s.criterion.label(),
            &s.samples.to_string(),
            &s.failed.to_string(),
            &s.degenerate.to_string(),
            &fmt_f64(s.mean_score),
            &fmt_f64(s.peak_score),
            &fmt_f64(s.failure_rate),
            &fmt_f64(s.avg_estimate_us),
            OUTPUT_SCHEMA_VERSION,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_manifest_json(outdir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = outdir.join("manifest.json");
    let payload = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, payload)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;
    Ok(path)
}
