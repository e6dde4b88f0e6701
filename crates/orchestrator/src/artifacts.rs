//! Per-run artifact writers: `script.json`, `infopool.json`,
//! `task_results.json`, and the per-step/per-agent raw-call log (§6).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sa_domain::error::Result;
use sa_domain::stream::Usage;

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// script.json
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PictureEntry {
    pub last: String,
    pub next: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubgoalInfo {
    /// The device command string executed for this subgoal's last step.
    pub opter: String,
    pub picture: Vec<PictureEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSubgoal {
    pub subgoal: String,
    pub info: SubgoalInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub total_plan: String,
    pub subgoals: Vec<ScriptSubgoal>,
}

impl ScriptArtifact {
    /// Append one step's before/after picture pair under `subgoal`,
    /// starting a new `ScriptSubgoal` entry when the subgoal text
    /// differs from the most recently appended one.
    pub fn append_step(
        &mut self,
        subgoal: &str,
        command: &str,
        before: &str,
        after: &str,
        mode: Option<&str>,
        mark: Option<&str>,
    ) {
        let picture = PictureEntry {
            last: before.to_string(),
            next: after.to_string(),
        };
        let needs_new_entry = self
            .subgoals
            .last()
            .map(|entry| entry.subgoal != subgoal)
            .unwrap_or(true);

        if needs_new_entry {
            self.subgoals.push(ScriptSubgoal {
                subgoal: subgoal.to_string(),
                info: SubgoalInfo {
                    opter: command.to_string(),
                    picture: vec![picture],
                    mode: mode.map(str::to_string),
                    mark: mark.map(str::to_string),
                },
            });
        } else if let Some(entry) = self.subgoals.last_mut() {
            entry.info.opter = command.to_string();
            entry.info.picture.push(picture);
            if mark.is_some() {
                entry.info.mark = mark.map(str::to_string);
            }
        }
    }

    pub fn write(&self, run_dir: &Path) -> Result<()> {
        write_json(&run_dir.join("script.json"), self)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// infopool.json
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfopoolArtifact {
    pub plans: Vec<String>,
    pub completed_subgoals: Vec<String>,
    pub summaries: Vec<String>,
    pub progress: Vec<String>,
    pub total_plan: String,
}

impl InfopoolArtifact {
    pub fn append_step(&mut self, plan: &str, completed_subgoal: &str, summary: &str, progress: &str) {
        self.plans.push(plan.to_string());
        self.completed_subgoals.push(completed_subgoal.to_string());
        self.summaries.push(summary.to_string());
        self.progress.push(progress.to_string());
    }

    pub fn write(&self, run_dir: &Path) -> Result<()> {
        write_json(&run_dir.join("infopool.json"), self)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// task_results.json
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStatusReport {
    pub status_reason: String,
    #[serde(default)]
    pub app_tricks_mined: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResults {
    pub goal: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 0.0 when the task finalized normally, 1.0 when the step budget
    /// was exhausted (§4.9 step 1).
    pub step_limit: f64,
    pub task_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_status_report: Option<TestStatusReport>,
    pub token_usage: HashMap<String, Usage>,
    pub total_tokens: u32,
    pub execution_steps: u32,
}

impl TaskResults {
    pub fn write(&self, run_dir: &Path) -> Result<()> {
        write_json(&run_dir.join("task_results.json"), self)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-step / per-agent raw call log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
struct AgentCallRecord<'a> {
    step: u32,
    role: &'a str,
    prompt: &'a str,
    raw_response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'a Usage>,
}

/// Write `Steps/step_<n>/<role>.json` and append one line to
/// `chat/chat_log.jsonl` (§6 per-run artifacts).
pub fn log_agent_call(
    run_dir: &Path,
    step: u32,
    role: &str,
    prompt: &str,
    raw_response: &str,
    usage: Option<&Usage>,
) -> Result<()> {
    let record = AgentCallRecord {
        step,
        role,
        prompt,
        raw_response,
        usage,
    };

    let step_path = run_dir
        .join("Steps")
        .join(format!("step_{step}"))
        .join(format!("{role}.json"));
    write_json(&step_path, &record)?;

    let chat_dir = run_dir.join("chat");
    fs::create_dir_all(&chat_dir)?;
    let line = serde_json::to_string(&record)?;
    let log_path = chat_dir.join("chat_log.jsonl");
    let mut existing = fs::read_to_string(&log_path).unwrap_or_default();
    existing.push_str(&line);
    existing.push('\n');
    fs::write(log_path, existing)?;
    Ok(())
}
