//! Command-line surface for the task-runner binary (§6 "CLI").

use clap::Parser;

/// Run a single mobile-automation task against one device.
#[derive(Debug, Parser)]
#[command(name = "sa-agent", version, about)]
pub struct Cli {
    /// Path to the TOML config file. Defaults to `$SA_CONFIG` or `config.toml`.
    #[arg(long)]
    pub config: Option<String>,

    /// Natural-language task instruction (simple-task shorthand).
    #[arg(long)]
    pub instruction: Option<String>,
    /// Scenario file providing the instruction + knowledge blobs.
    #[arg(long)]
    pub scenario_file: Option<String>,
    /// App/scenario selector within `scenario_file`.
    #[arg(long)]
    pub scenario_id: Option<String>,

    /// Primary model provider id (planner/executor/reflector).
    #[arg(long)]
    pub provider: Option<String>,
    /// Primary model name.
    #[arg(long)]
    pub model: Option<String>,
    /// Summary model provider id (path-summarizer/recorder/task-judge).
    #[arg(long)]
    pub summary_provider: Option<String>,
    /// Summary model name.
    #[arg(long)]
    pub summary_model: Option<String>,

    /// adb/hdc binary path override.
    #[arg(long)]
    pub adb_path: Option<String>,
    /// Device serial, or `ip:port` for a network target.
    #[arg(long)]
    pub device_id: Option<String>,

    /// `direct_coord` or `mark_indexed`.
    #[arg(long)]
    pub perception_mode: Option<String>,
    /// Step budget override.
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Output run directory. Defaults to `<run_root>/<uuid>`.
    #[arg(long)]
    pub run_dir: Option<String>,

    #[arg(long)]
    pub reflector_tree_check: bool,
    #[arg(long)]
    pub task_judge: bool,
    #[arg(long)]
    pub recorder: bool,
    #[arg(long)]
    pub planner_tricks: bool,
    #[arg(long, default_value_t = 3)]
    pub planner_tricks_topk: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_instruction_invocation() {
        let cli = Cli::parse_from(["sa-agent", "--instruction", "open wifi settings"]);
        assert_eq!(cli.instruction.as_deref(), Some("open wifi settings"));
        assert!(!cli.task_judge);
        assert_eq!(cli.planner_tricks_topk, 3);
    }

    #[test]
    fn parses_scenario_invocation_with_toggles() {
        let cli = Cli::parse_from([
            "sa-agent",
            "--scenario-file",
            "scenarios.json",
            "--scenario-id",
            "wifi_01",
            "--task-judge",
            "--recorder",
            "--planner-tricks",
        ]);
        assert_eq!(cli.scenario_id.as_deref(), Some("wifi_01"));
        assert!(cli.task_judge && cli.recorder && cli.planner_tricks);
    }
}
