//! `sa-report`: aggregate a directory of run results into CSV or JSON
//! (§10.5).

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sa_reporting::{collect_rows, write_csv, write_json};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "sa-report")]
struct Cli {
    /// Directory containing one subdirectory per run, each with its own
    /// `task_results.json` (typically `job_service.run_root`).
    #[arg(long)]
    run_root: PathBuf,
    #[arg(long, value_enum, default_value = "csv")]
    format: Format,
    /// Output path. Defaults to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let rows = collect_rows(&cli.run_root).context("collecting task results")?;
    tracing::info!(count = rows.len(), run_root = %cli.run_root.display(), "collected rows");

    match cli.out {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            write_report(&rows, cli.format, file)?;
        }
        None => write_report(&rows, cli.format, std::io::stdout())?,
    }
    Ok(())
}

fn write_report<W: std::io::Write>(rows: &[sa_reporting::ResultRow], format: Format, out: W) -> anyhow::Result<()> {
    match format {
        Format::Csv => write_csv(rows, out)?,
        Format::Json => write_json(rows, out)?,
    }
    Ok(())
}
