//! `vbsel run`, `validate` and `config`.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vbsel_analysis::{Analysis, AnalysisConfig, RunOutput, run_events_streaming};
use vbsel_io::{JsonlEventSource, ParquetFileWriter};

/// Files written by `vbsel run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunPaths {
    pub out_dir: PathBuf,
    pub histograms_json: PathBuf,
    pub cutflow_json: PathBuf,
    pub ntuple_parquet: PathBuf,
}

pub fn derive_paths(out_dir: &Path) -> RunPaths {
    RunPaths {
        out_dir: out_dir.to_path_buf(),
        histograms_json: out_dir.join("histograms.json"),
        cutflow_json: out_dir.join("cutflow.json"),
        ntuple_parquet: out_dir.join("ntuple.parquet"),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading config");
            Ok(AnalysisConfig::load(p)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn prepare_out_dir(dir: &Path, overwrite: bool) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            anyhow::bail!("out_dir exists but is not a directory: {}", dir.display());
        }
        if !overwrite && dir.read_dir()?.next().is_some() {
            anyhow::bail!("out_dir must be empty (use --overwrite): {}", dir.display());
        }
    } else {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn cmd_run(
    config: Option<&PathBuf>,
    input: &Path,
    out_dir: &Path,
    threads: Option<usize>,
    overwrite: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let analysis = Analysis::from_config(&config)?;

    let mut settings = config.run_settings();
    if let Some(t) = threads {
        settings.threads = t;
    }
    if settings.threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global();
    }

    prepare_out_dir(out_dir, overwrite)?;
    let paths = derive_paths(out_dir);

    tracing::info!(path = %input.display(), threads = settings.threads, "reading events");
    let mut source = JsonlEventSource::open(input)?;
    let schema = Arc::new(analysis.new_ntuple().schema().arrow_schema());
    let mut parquet = ParquetFileWriter::create(&paths.ntuple_parquet, schema)?;
    let output = run_events_streaming(&analysis, &mut source, &settings, |batch| {
        parquet.write(&batch)?;
        Ok(())
    })?;
    tracing::info!(lines = source.lines_read(), "input exhausted");
    let rows = parquet.close()?;

    write_outputs(&output, &paths, rows)?;

    let summary = serde_json::json!({
        "processed": output.cutflow.processed,
        "accepted": output.cutflow.accepted,
        "skipped": output.cutflow.skipped,
        "rows": rows,
        "outputs": paths,
    });
    write_json(None, summary)
}

/// Histograms and cutflow; the ntuple is already on disk.
fn write_outputs(output: &RunOutput, paths: &RunPaths, rows: usize) -> Result<()> {
    std::fs::write(
        &paths.histograms_json,
        serde_json::to_string_pretty(output.book.histograms())?,
    )?;
    std::fs::write(&paths.cutflow_json, serde_json::to_string_pretty(&output.cutflow)?)?;
    tracing::info!(
        rows,
        histograms = output.book.len(),
        out_dir = %paths.out_dir.display(),
        "outputs written"
    );
    Ok(())
}

pub fn cmd_validate(config: &Path, output: Option<&PathBuf>) -> Result<()> {
    let cfg = AnalysisConfig::load(config)?;
    let analysis = Analysis::from_config(&cfg)?;
    let book = analysis.new_book();
    let schema = analysis.new_ntuple();

    let summary = serde_json::json!({
        "valid": true,
        "variables": analysis.catalogue().len(),
        "histograms": book.len(),
        "columns": schema.schema().len(),
        "regions": analysis.region_names(),
        "overlap_steps": analysis.pipeline().overlap.len(),
        "min_signal_jets": analysis.pipeline().min_signal_jets,
    });
    write_json(output, summary)
}

pub fn cmd_config(output: Option<&PathBuf>) -> Result<()> {
    let yaml = AnalysisConfig::default().to_yaml()?;
    if let Some(path) = output {
        std::fs::write(path, yaml)?;
    } else {
        print!("{yaml}");
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
