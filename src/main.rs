use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use subspace_doa::config::{ExperimentConfig, SignalMode};
use subspace_doa::dataset::{Dataset, DatasetBuilder, Split};
use subspace_doa::evaluation::evaluate;
use subspace_doa::io::{
    ensure_outdir, write_manifest_json, write_summary_csv, Manifest, SummaryRow,
    OUTPUT_SCHEMA_VERSION,
};
use subspace_doa::methods::{build_method, canonical_method_list, MethodOptions, METHOD_ORDER};
use subspace_doa::store::{DatasetKey, DatasetStore, JsonDirStore};
use subspace_doa::system_model::SystemModel;

#[derive(Debug, Parser)]
#[command(name = "doa-bench")]
#[command(about = "Synthetic benchmarking of subspace direction-of-arrival estimators")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "output-doa-bench")]
    outdir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated estimator names
    #[arg(long)]
    methods: Option<String>,

    /// Directory used to cache generated datasets as JSON
    #[arg(long)]
    dataset_dir: Option<PathBuf>,
}

fn resolve_default_config_path() -> PathBuf {
    let local = PathBuf::from("configs").join("default.toml");
    if local.exists() {
        return local;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join("default.toml")
}

fn resolve_run_output_dir(base_outdir: &Path) -> Result<PathBuf> {
    ensure_outdir(base_outdir)?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

    let mut candidate = base_outdir.join(&stamp);
    let mut suffix = 1usize;
    while candidate.exists() {
        if suffix > 999 {
            bail!(
                "failed to allocate unique run output directory under {}",
                base_outdir.display()
            );
        }
        candidate = base_outdir.join(format!("{stamp}_{suffix:03}"));
        suffix += 1;
    }

    ensure_outdir(&candidate)?;
    Ok(candidate)
}

fn parse_methods(cli_methods: Option<&str>, cfg: &ExperimentConfig) -> Result<Vec<String>> {
    let requested: Vec<String> = if let Some(raw) = cli_methods {
        raw.split(',')
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect()
    } else if !cfg.methods.is_empty() {
        cfg.methods.iter().map(|m| m.to_lowercase()).collect()
    } else {
        METHOD_ORDER.iter().map(|m| m.to_string()).collect()
    };

    if requested.is_empty() {
        bail!("methods list cannot be empty");
    }

    for m in &requested {
        if !METHOD_ORDER.contains(&m.as_str()) {
            bail!(
                "unknown method '{m}'. valid methods: {}",
                METHOD_ORDER.join(",")
            );
        }
    }

    let mut methods = canonical_method_list(&requested);
    if cfg.system.mode == SignalMode::NonCoherent {
        let before = methods.len();
        methods.retain(|m| !m.starts_with("sps-"));
        if methods.len() < before {
            tracing::warn!("spatial smoothing methods skipped for non-coherent sources");
        }
    }
    if methods.is_empty() {
        bail!("no methods left to run for {} sources", cfg.system.mode.label());
    }
    Ok(methods)
}

/// Test dataset for one SNR, read from the store when present.
///
/// The train split is only synthesized when a store will keep it.
fn load_or_build_test_set(
    cfg: &ExperimentConfig,
    model: &SystemModel,
    store: Option<&mut dyn DatasetStore>,
) -> Result<Dataset> {
    let params = model.params();
    let key = |split, samples| {
        DatasetKey::new(params, cfg.min_gap_deg, cfg.keep_snapshots, split, samples, cfg.seed)
    };
    let test_key = key(Split::Test, cfg.test_samples);

    if let Some(store) = &store {
        if store.contains(&test_key) {
            tracing::info!(key = %test_key, "reusing cached dataset");
            return Ok(store.get(&test_key)?);
        }
    }

    let builder = DatasetBuilder::new(model, cfg.min_gap_deg).keep_snapshots(cfg.keep_snapshots);
    let test = builder.build_split(cfg.test_samples, Split::Test, cfg.seed)?;

    if let Some(store) = store {
        if cfg.train_samples > 0 {
            let train_key = key(Split::Train, cfg.train_samples);
            if !store.contains(&train_key) {
                let train = builder.build_split(cfg.train_samples, Split::Train, cfg.seed)?;
                store.put(&train_key, &train)?;
            }
        }
        store.put(&test_key, &test)?;
    }
    Ok(test)
}

fn run(cfg: &ExperimentConfig, methods: &[String], outdir: &Path, dataset_dir: Option<&Path>) -> Result<()> {
    let mut store = dataset_dir.map(JsonDirStore::open).transpose()?;
    let options = MethodOptions {
        grid_step_deg: cfg.grid_step_deg,
        smoothing_subarray: cfg.smoothing_subarray,
        keep_spectrum: false,
    };

    let mut summary_rows = Vec::<SummaryRow>::new();
    let snr_values = cfg.snr_values();

    for &snr_db in &snr_values {
        let model = SystemModel::new(cfg.system_at(snr_db))?;
        let test = load_or_build_test_set(
            cfg,
            &model,
            store.as_mut().map(|s| s as &mut dyn DatasetStore),
        )?;
        tracing::info!(snr_db, samples = test.len(), "test set ready");

        for name in methods {
            let method = build_method(name, model.nominal_geometry(), &options)?;
            let summary = evaluate(method.as_ref(), &test, model.sources(), cfg.criterion);
            summary_rows.push(SummaryRow::new(model.params(), cfg.seed, summary));
        }
    }

    write_summary_csv(&outdir.join("summary.csv"), &summary_rows)?;
    write_manifest_json(
        outdir,
        &Manifest {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            scenario: cfg.system.scenario.label().to_string(),
            mode: cfg.system.mode.label().to_string(),
            methods: methods.to_vec(),
            snr_db: snr_values,
            seed: cfg.seed,
            test_samples: cfg.test_samples,
            criterion: cfg.criterion.label().to_string(),
            note: "Synthetic subspace DOA benchmark outputs".to_string(),
        },
    )?;

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(resolve_default_config_path);
    let mut cfg = ExperimentConfig::from_toml_file(&config_path)?;
    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }

    let methods = parse_methods(cli.methods.as_deref(), &cfg)?;
    let run_outdir = resolve_run_output_dir(&cli.outdir)?;

    run(&cfg, &methods, &run_outdir, cli.dataset_dir.as_deref())?;

    println!("wrote outputs to {}", run_outdir.display());
    Ok(())
}
