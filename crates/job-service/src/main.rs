//! `sa-job-service`: a long-running HTTP front door that multiplexes
//! mobile-automation tasks across a bounded device pool, each task
//! running as a supervised `sa-agent` subprocess (§4.10, §5, §6).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sa_domain::config::{Config, ConfigSeverity};
use sa_job_service::app::build_router;
use sa_job_service::jobs::{JobStore, UserActiveMap};
use sa_job_service::pool::DevicePool;
use sa_job_service::spawn::ProcessTable;
use sa_job_service::state::AppState;
use sa_job_service::worker::spawn_workers;

#[derive(Parser, Debug)]
#[command(name = "sa-job-service")]
struct Cli {
    /// Path to the shared `sa-agent`/job-service TOML config. Defaults to
    /// `$SA_CONFIG` or `config.toml` in the working directory.
    #[arg(long)]
    config: Option<String>,
    /// Path to the `sa-agent` binary each job shells out to.
    #[arg(long, default_value = "sa-agent")]
    agent_binary: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_deref())?;

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config validation failed, see errors above");
    }

    let job_config = Arc::new(config.job_service.clone());
    if job_config.device_pool.is_empty() {
        tracing::warn!("job_service.device_pool is empty — every /run request will queue forever");
    }
    std::fs::create_dir_all(&job_config.run_root).context("creating run_root directory")?;

    let devices = Arc::new(DevicePool::new(
        job_config.device_pool.clone(),
        config.device.adb_path.clone(),
    ));
    let (queue_tx, queue_rx) = mpsc::channel(256);

    let state = AppState {
        config: job_config,
        agent_binary: Arc::new(cli.agent_binary),
        agent_config_path: Arc::new(config_path),
        jobs: Arc::new(JobStore::new()),
        users: Arc::new(UserActiveMap::new()),
        devices,
        processes: Arc::new(ProcessTable::new()),
        queue_tx,
    };

    spawn_workers(state.clone(), queue_rx);

    let addr = state.config.bind_addr.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "sa-job-service listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_job_service=debug")),
        )
        .init();
}

/// Load config from `--config`, else `$SA_CONFIG`, else `config.toml` in
/// the working directory, else defaults. Returns the path actually used
/// (if any), so it can be re-written by `POST /config`.
fn load_config(config_flag: Option<&str>) -> anyhow::Result<(Config, Option<String>)> {
    let path = config_flag
        .map(|s| s.to_string())
        .or_else(|| std::env::var("SA_CONFIG").ok())
        .or_else(|| std::path::Path::new("config.toml").exists().then(|| "config.toml".to_string()));

    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading config at {path}"))?;
            let config: Config = toml::from_str(&raw).with_context(|| format!("parsing config at {path}"))?;
            Ok((config, Some(path)))
        }
        None => Ok((Config::default(), None)),
    }
}
