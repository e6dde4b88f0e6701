//! CSV/JSON tabular export over a directory of run directories, each
//! holding one `task_results.json` (§10.5).
//!
//! No `csv` crate dependency: CSV rows are hand-written the same way
//! this codebase hand-writes JSONL lines for its run log rather than
//! pull in a line-serialization crate.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};

/// One `task_results.json`, the shape written by
/// `orchestrator::artifacts::TaskResults`. Deserialized independently
/// here rather than depending on the orchestrator crate, since
/// reporting only needs a handful of its fields.
#[derive(Debug, Clone, Deserialize)]
struct TaskResultsFile {
    goal: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    step_limit: f64,
    task_status: String,
    total_tokens: u32,
    execution_steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub job_id: String,
    pub task: String,
    pub status: String,
    pub step_limit: f64,
    pub total_tokens: u32,
    pub execution_steps: u32,
    pub duration_secs: f64,
}

/// Scan every immediate subdirectory of `run_root` for a
/// `task_results.json` and flatten into rows, one per run. Directories
/// without one are silently skipped — not every run directory holds a
/// finished task (a still-running job has none yet).
pub fn collect_rows(run_root: &Path) -> Result<Vec<ResultRow>> {
    let mut rows = Vec::new();
    let entries = fs::read_dir(run_root).map_err(Error::Io)?;

    for entry in entries {
        let entry = entry.map_err(Error::Io)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let results_path = path.join("task_results.json");
        if !results_path.is_file() {
            continue;
        }

        let raw = fs::read_to_string(&results_path).map_err(Error::Io)?;
        let parsed: TaskResultsFile = serde_json::from_str(&raw).map_err(Error::Json)?;
        let job_id = entry.file_name().to_string_lossy().into_owned();
        let duration_secs = (parsed.finished_at - parsed.started_at).num_milliseconds() as f64 / 1000.0;

        rows.push(ResultRow {
            job_id,
            task: parsed.goal,
            status: parsed.task_status,
            step_limit: parsed.step_limit,
            total_tokens: parsed.total_tokens,
            execution_steps: parsed.execution_steps,
            duration_secs,
        });
    }

    rows.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    Ok(rows)
}

/// Write `rows` as CSV to `out`. Fields containing `,`, `"`, or a
/// newline are quoted and internal quotes doubled, per RFC 4180 — the
/// only escaping this hand-written writer needs to support, since every
/// column here is either numeric or a single-line instruction string.
pub fn write_csv<W: Write>(rows: &[ResultRow], mut out: W) -> Result<()> {
    writeln!(
        out,
        "job_id,task,status,step_limit,total_tokens,execution_steps,duration_secs"
    )
    .map_err(Error::Io)?;

    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            csv_field(&row.job_id),
            csv_field(&row.task),
            csv_field(&row.status),
            row.step_limit,
            row.total_tokens,
            row.execution_steps,
            row.duration_secs,
        )
        .map_err(Error::Io)?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn write_json<W: Write>(rows: &[ResultRow], out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, rows).map_err(Error::Json)
}
