//! Subprocess supervision for the `sa-agent` task runner (§4.10, §5).
//!
//! Grounded on this codebase's exec-tool spawn/kill-channel pattern:
//! a background task owns the `Child`, a kill channel lets the worker
//! request termination, and `tokio::select!` races exit against the
//! kill signal and a grace-period timeout.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Tracks the kill channel for every in-flight job subprocess, so
/// `POST /stop/{job_id}` can reach a worker running elsewhere in the
/// process.
#[derive(Default)]
pub struct ProcessTable {
    kills: Mutex<HashMap<Uuid, mpsc::Sender<()>>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, job_id: Uuid, kill_tx: mpsc::Sender<()>) {
        self.kills.lock().insert(job_id, kill_tx);
    }

    fn remove(&self, job_id: Uuid) {
        self.kills.lock().remove(&job_id);
    }

    /// Signal termination. Returns false if the job has already
    /// finished (no registered kill channel).
    pub async fn stop(&self, job_id: Uuid) -> bool {
        let tx = self.kills.lock().get(&job_id).cloned();
        match tx {
            Some(tx) => tx.send(()).await.is_ok(),
            None => false,
        }
    }
}

/// Result of running one job's subprocess to completion.
pub struct RunOutcome {
    pub success: bool,
    pub stopped: bool,
    pub stderr_tail: String,
}

/// Spawn `binary args...`, supervise it to exit (or a stop request, or
/// the grace period after one), and return the outcome. stdin is
/// closed immediately as the "graceful" half of shutdown — `sa-agent`
/// has no subprocess children of its own to coordinate, so closing its
/// stdin pipe before the hard kill is the best cooperative signal
/// available without a signal-sending dependency the rest of this
/// stack does not otherwise need.
pub async fn run_supervised(
    binary: &str,
    args: &[String],
    job_id: Uuid,
    table: &ProcessTable,
    grace_period: Duration,
) -> std::io::Result<RunOutcome> {
    let mut cmd = tokio::process::Command::new(binary);
    cmd.args(args);
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let mut child = cmd.spawn()?;
    let stdin = child.stdin.take();
    let stderr = child.stderr.take();
    drop(child.stdout.take());

    let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);
    table.register(job_id, kill_tx);

    let stderr_tail = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut tail = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tail.push_str(&line);
                tail.push('\n');
                const MAX_TAIL_BYTES: usize = 8192;
                if tail.len() > MAX_TAIL_BYTES {
                    let excess = tail.len() - MAX_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
        tail
    });

    let outcome = tokio::select! {
        status = child.wait() => {
            RunOutcome {
                success: status.map(|s| s.success()).unwrap_or(false),
                stopped: false,
                stderr_tail: String::new(),
            }
        }
        _ = kill_rx.recv() => {
            drop(stdin);
            let graceful = tokio::time::timeout(grace_period, child.wait()).await;
            if graceful.is_err() {
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
            RunOutcome {
                success: false,
                stopped: true,
                stderr_tail: String::new(),
            }
        }
    };

    table.remove(job_id);
    let tail = stderr_tail.await.unwrap_or_default();
    Ok(RunOutcome { stderr_tail: tail, ..outcome })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_reports_success() {
        let table = ProcessTable::new();
        let outcome = run_supervised("true", &[], Uuid::new_v4(), &table, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(!outcome.stopped);
    }

    #[tokio::test]
    async fn failing_command_reports_failure() {
        let table = ProcessTable::new();
        let outcome = run_supervised("false", &[], Uuid::new_v4(), &table, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn stop_terminates_a_long_running_process() {
        let table = std::sync::Arc::new(ProcessTable::new());
        let job_id = Uuid::new_v4();
        let table2 = table.clone();

        let handle = tokio::spawn(async move {
            run_supervised(
                "sh",
                &["-c".to_string(), "sleep 30".to_string()],
                job_id,
                &table2,
                Duration::from_millis(50),
            )
            .await
            .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(table.stop(job_id).await);

        let outcome = handle.await.unwrap();
        assert!(outcome.stopped);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn stop_on_unknown_job_returns_false() {
        let table = ProcessTable::new();
        assert!(!table.stop(Uuid::new_v4()).await);
    }
}
