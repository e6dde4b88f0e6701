//! Worker pool: one worker per device-pool slot, each dequeuing a job,
//! acquiring a device, running the `sa-agent` subprocess, and releasing
//! the device on exit (§4.10, §5 "N workers where N equals the
//! device-pool size, each pinned to one acquired device").

use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::jobs::JobState;
use crate::spawn::run_supervised;
use crate::state::AppState;

/// Spawn `state.devices.size()` worker tasks, all draining the same
/// queue receiver. Returns immediately; workers run until the receiver
/// is dropped/closed.
pub fn spawn_workers(state: AppState, mut queue_rx: mpsc::Receiver<Uuid>) {
    let worker_count = state.devices.size().max(1);

    // A single shared receiver can't be cloned, so one worker owns the
    // queue and dispatches to `worker_count` concurrent permits instead
    // of one task per device. This keeps the "N workers == N devices"
    // concurrency bound without needing an mpmc channel dependency the
    // rest of this stack doesn't otherwise pull in.
    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(worker_count));

    tokio::spawn(async move {
        while let Some(job_id) = queue_rx.recv().await {
            let permit = semaphore.clone().acquire_owned().await;
            let Ok(permit) = permit else { break };
            let state = state.clone();
            tokio::spawn(async move {
                run_one(&state, job_id).await;
                drop(permit);
            });
        }
    });
}

async fn run_one(state: &AppState, job_id: Uuid) {
    let Some(job) = state.jobs.get(job_id) else {
        return;
    };

    let device_id = state.devices.acquire().await;
    state.jobs.set_running(job_id, device_id.clone());

    let mut args = vec![
        "--instruction".to_string(),
        job.instruction.clone(),
        "--device-id".to_string(),
        device_id.clone(),
        "--run-dir".to_string(),
        job.run_dir.display().to_string(),
    ];
    if let Some(config_path) = state.agent_config_path.as_ref() {
        args.push("--config".to_string());
        args.push(config_path.clone());
    }

    let grace = Duration::from_secs(state.config.stop_grace_period_secs);
    let result = run_supervised(&state.agent_binary, &args, job_id, &state.processes, grace).await;

    match result {
        Ok(outcome) if outcome.stopped => {
            state.jobs.mark_stopped(job_id);
        }
        Ok(outcome) if outcome.success => {
            state.jobs.finalize(job_id, JobState::Success, None);
        }
        Ok(outcome) => {
            state.jobs.finalize(job_id, JobState::Failed, Some(outcome.stderr_tail));
        }
        Err(e) => {
            state.jobs.finalize(job_id, JobState::Failed, Some(e.to_string()));
        }
    }

    state.devices.release(device_id).await;
    state.users.release(&job.user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Job, JobStore, UserActiveMap};
    use crate::pool::DevicePool;
    use crate::spawn::ProcessTable;
    use sa_domain::config::JobServiceConfig;
    use std::sync::Arc;

    fn test_state(agent_binary: &str) -> (AppState, mpsc::Receiver<Uuid>) {
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let state = AppState {
            config: Arc::new(JobServiceConfig {
                stop_grace_period_secs: 1,
                ..JobServiceConfig::default()
            }),
            agent_binary: Arc::new(agent_binary.to_string()),
            agent_config_path: Arc::new(None),
            jobs: Arc::new(JobStore::new()),
            users: Arc::new(UserActiveMap::new()),
            devices: Arc::new(DevicePool::new(vec!["dev-1".into()], "echo")),
            processes: Arc::new(ProcessTable::new()),
            queue_tx,
        };
        (state, queue_rx)
    }

    #[tokio::test]
    async fn run_one_finalizes_success_and_releases_device() {
        let (state, _rx) = test_state("true");
        let job = Job::new("alice".into(), "open wifi".into(), std::env::temp_dir());
        let id = job.id;
        state.users.try_acquire("alice", id).unwrap();
        state.jobs.insert(job);

        run_one(&state, id).await;

        assert_eq!(state.jobs.get(id).unwrap().state, JobState::Success);
        // Device was released back to the pool.
        let reacquired = state.devices.acquire().await;
        assert_eq!(reacquired, "dev-1");
        assert!(state.users.try_acquire("alice", Uuid::new_v4()).is_ok());
    }

    #[tokio::test]
    async fn run_one_finalizes_failure_on_nonzero_exit() {
        let (state, _rx) = test_state("false");
        let job = Job::new("bob".into(), "open wifi".into(), std::env::temp_dir());
        let id = job.id;
        state.jobs.insert(job);

        run_one(&state, id).await;
        assert_eq!(state.jobs.get(id).unwrap().state, JobState::Failed);
    }
}
