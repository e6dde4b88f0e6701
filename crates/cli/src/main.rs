//! `sa-agent`: runs one mobile-automation task against one device and
//! writes its artifacts to a run directory (§6 "CLI").

mod cli;
mod scenario;

use std::collections::HashMap;
use std::fs;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sa_agents::AgentClient;
use sa_device::android::AndroidDriver;
use sa_device::harmony::HarmonyDriver;
use sa_device::DeviceDriver;
use sa_domain::capability::ModelRole;
use sa_domain::config::{Config, DevicePlatform};
use sa_domain::state::{PerceptionMode, TaskRecord};
use sa_orchestrator::TaskRunner;
use sa_providers::registry::ProviderRegistry;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    let issues = config.validate();

    let run_dir = match &cli.run_dir {
        Some(dir) => std::path::PathBuf::from(dir),
        None => std::path::PathBuf::from(&config.job_service.run_root).join(Uuid::new_v4().to_string()),
    };
    fs::create_dir_all(&run_dir).context("creating run directory")?;
    let terminallog_dir = run_dir.join("terminallog");
    fs::create_dir_all(&terminallog_dir).context("creating terminallog directory")?;
    let _tracing_guard = init_tracing(&terminallog_dir.join("stdout.log"))?;

    for issue in &issues {
        tracing::warn!(%issue, "config issue");
    }
    if issues.iter().any(|e| e.severity == sa_domain::config::ConfigSeverity::Error) {
        bail!("configuration has unresolved errors, see warnings above");
    }

    let task = resolve_task(&cli)?;

    let driver = build_driver(&config);
    let clients = build_clients(&config)?;

    let tricks_path = if cli.planner_tricks {
        Some(run_dir.join("..").join("tricks.json"))
    } else {
        None
    };

    let runner = TaskRunner {
        driver: driver.as_ref(),
        clients,
        device_config: config.device.clone(),
        perception_config: config.perception.clone(),
        orchestrator_config: config.orchestrator.clone(),
        convention: config.perception.coordinate_convention,
        width: 1080,
        height: 2400,
        run_dir: run_dir.clone(),
        tricks_path,
    };

    let results = runner.run(task).await?;
    tracing::info!(
        task_status = %results.task_status,
        steps = results.execution_steps,
        tokens = results.total_tokens,
        run_dir = %run_dir.display(),
        "task finished"
    );
    println!(
        "task_status={} steps={} tokens={} run_dir={}",
        results.task_status,
        results.execution_steps,
        results.total_tokens,
        run_dir.display(),
    );

    if results.step_limit > 0.0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Mirror every log line to stderr and to `<run_dir>/terminallog/stdout.log`
/// (§6 "captured stdout", §7 "printed to the per-run stdout log"). The
/// returned guard must stay alive for the process lifetime or the
/// non-blocking file writer drops queued lines on exit.
fn init_tracing(stdout_log_path: &std::path::Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = fs::File::create(stdout_log_path)
        .with_context(|| format!("creating {}", stdout_log_path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_cli=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

/// Load config from `--config`, else `$SA_CONFIG`, else `config.toml` if
/// present, else defaults.
fn load_config(config_flag: Option<&str>) -> anyhow::Result<Config> {
    let path = config_flag
        .map(String::from)
        .or_else(|| std::env::var("SA_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".into());

    if std::path::Path::new(&path).exists() {
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        let config: Config = toml::from_str(&raw).with_context(|| format!("parsing {path}"))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Layer CLI flags over the loaded file config (flags win).
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(adb_path) = &cli.adb_path {
        config.device.adb_path = adb_path.clone();
    }
    if let Some(device_id) = &cli.device_id {
        config.device.device_id = Some(device_id.clone());
    }
    if let Some(mode) = &cli.perception_mode {
        config.perception.mode = match mode.as_str() {
            "mark_indexed" => sa_domain::config::PerceptionMode::MarkIndexed,
            _ => sa_domain::config::PerceptionMode::DirectCoord,
        };
    }
    if let Some(max_steps) = cli.max_steps {
        config.orchestrator.max_steps = max_steps;
    }
    config.orchestrator.task_judge_enabled = cli.task_judge || config.orchestrator.task_judge_enabled;
    config.orchestrator.recorder_enabled = cli.recorder || config.orchestrator.recorder_enabled;
    if cli.planner_tricks {
        config.orchestrator.trick_injection_top_k = cli.planner_tricks_topk;
    }

    if let (Some(provider), Some(model)) = (&cli.provider, &cli.model) {
        for role in [ModelRole::Planner, ModelRole::Executor, ModelRole::Reflector] {
            config.model_roles.insert(
                role,
                sa_domain::config::RoleModelConfig {
                    provider: provider.clone(),
                    model: model.clone(),
                    ..sa_domain::config::RoleModelConfig::default()
                },
            );
        }
    }
    if let (Some(provider), Some(model)) = (&cli.summary_provider, &cli.summary_model) {
        for role in [ModelRole::PathSummarizer, ModelRole::Recorder, ModelRole::TaskJudge] {
            config.model_roles.insert(
                role,
                sa_domain::config::RoleModelConfig {
                    provider: provider.clone(),
                    model: model.clone(),
                    ..sa_domain::config::RoleModelConfig::default()
                },
            );
        }
    }
}

fn build_driver(config: &Config) -> Box<dyn DeviceDriver> {
    match config.device.platform {
        DevicePlatform::Android => Box::new(AndroidDriver::new(
            config.device.adb_path.clone(),
            config.device.device_id.clone(),
            config.device.print_device_cmd,
        )),
        DevicePlatform::HarmonyOs => Box::new(HarmonyDriver::new(
            config.device.adb_path.clone(),
            config.device.print_device_cmd,
        )),
    }
}

/// Resolve an `AgentClient` per configured model role from the provider
/// registry. Roles with no wiring in `model_roles` are simply absent —
/// the orchestrator tolerates a missing optional role and errors only
/// when a required one (planner/executor/reflector) is invoked.
fn build_clients(config: &Config) -> anyhow::Result<HashMap<ModelRole, AgentClient>> {
    let registry = ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?;
    let mut clients = HashMap::new();

    for role in [
        ModelRole::Planner,
        ModelRole::Executor,
        ModelRole::Reflector,
        ModelRole::Recorder,
        ModelRole::PathSummarizer,
        ModelRole::TaskJudge,
    ] {
        let Some(role_cfg) = config.model_roles.get(role) else {
            continue;
        };
        let Some(provider) = registry.get(&role_cfg.provider) else {
            tracing::warn!(?role, provider = %role_cfg.provider, "model role wired to unknown/uninitialized provider, skipping");
            continue;
        };
        clients.insert(role, AgentClient::new(provider, role_cfg.clone()));
    }

    Ok(clients)
}

/// Build the task record either directly from `--instruction`, or by
/// looking up an app/scenario pair in `--scenario-file`.
fn resolve_task(cli: &Cli) -> anyhow::Result<TaskRecord> {
    if let Some(instruction) = &cli.instruction {
        return Ok(TaskRecord {
            instruction: instruction.clone(),
            task_name: sanitize_task_name(instruction),
            planner_knowledge: String::new(),
            executor_knowledge: String::new(),
            perception_mode: PerceptionMode::DirectCoord,
        });
    }

    let Some(scenario_file) = &cli.scenario_file else {
        bail!("either --instruction or --scenario-file is required");
    };
    let raw = fs::read_to_string(scenario_file).with_context(|| format!("reading {scenario_file}"))?;
    let data: scenario::ScenarioFile = serde_json::from_str(&raw).with_context(|| format!("parsing {scenario_file}"))?;
    let chosen = scenario::resolve_scenario(&data, cli.scenario_id.as_deref())?;

    Ok(TaskRecord {
        instruction: chosen.instruction.clone(),
        task_name: sanitize_task_name(&chosen.instruction),
        planner_knowledge: String::new(),
        executor_knowledge: String::new(),
        perception_mode: PerceptionMode::DirectCoord,
    })
}

fn sanitize_task_name(instruction: &str) -> String {
    instruction
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .take(6)
        .collect::<Vec<_>>()
        .join("_")
}
