//! Job records, the job store, and the per-user single-flight map
//! (§4.10, §5). Mirrors this codebase's `SessionLockMap`/`CancelMap`
//! conventions: `parking_lot::Mutex` around plain maps, no async locks
//! on the hot path.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state (§4.10: `queued -> running -> (success | failed | stopped)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Success,
    Failed,
    Stopped,
}

impl JobState {
    /// Once a job reaches one of these, no further status write may
    /// change it (§5 "a stopped job must not be overwritten").
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Stopped)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub user: String,
    pub instruction: String,
    pub state: JobState,
    pub device_id: Option<String>,
    pub run_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(user: String, instruction: String, run_dir: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            instruction,
            state: JobState::Queued,
            device_id: None,
            run_dir,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    /// List of artifact file names present under `run_dir`, as served by
    /// `GET /download/{job_id}/{file}` (§4.10).
    pub fn artifacts(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.run_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }
}

/// All jobs known to this process, keyed by id.
#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn set_running(&self, id: Uuid, device_id: String) {
        if let Some(job) = self.jobs.lock().get_mut(&id) {
            job.state = JobState::Running;
            job.device_id = Some(device_id);
        }
    }

    /// Finalize a job with a terminal state, unless it's already
    /// terminal (§5 "already terminal" race-safety check — a `stopped`
    /// job must never be downgraded by a late `failed`/`success`).
    pub fn finalize(&self, id: Uuid, state: JobState, error: Option<String>) {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get_mut(&id) {
            if job.state.is_terminal() {
                return;
            }
            job.state = state;
            job.error = error;
            job.finished_at = Some(Utc::now());
        }
    }

    /// Mark a job `stopped` unconditionally unless already terminal.
    /// Distinct from `finalize` so a stop request always wins the race
    /// against natural completion, per §5.
    pub fn mark_stopped(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        if job.state.is_terminal() {
            return false;
        }
        job.state = JobState::Stopped;
        job.finished_at = Some(Utc::now());
        true
    }
}

/// Per-user single-flight guard: at most one queued/running job per
/// user. Immediate-reject semantics (unlike the device pool's
/// block-until-available queue) — grounded on this codebase's
/// `SessionLockMap`, adapted from queueing to rejection per §5's
/// "Rust realization" note.
#[derive(Default)]
pub struct UserActiveMap {
    active: Mutex<HashMap<String, Uuid>>,
}

impl UserActiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `user`, failing if one is already active.
    pub fn try_acquire(&self, user: &str, job_id: Uuid) -> Result<(), Uuid> {
        let mut active = self.active.lock();
        if let Some(existing) = active.get(user) {
            return Err(*existing);
        }
        active.insert(user.to_string(), job_id);
        Ok(())
    }

    pub fn release(&self, user: &str) {
        self.active.lock().remove(user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_does_not_downgrade_stopped_job() {
        let store = JobStore::new();
        let job = Job::new("alice".into(), "open wifi".into(), PathBuf::from("/tmp/run1"));
        let id = job.id;
        store.insert(job);

        assert!(store.mark_stopped(id));
        store.finalize(id, JobState::Failed, Some("late failure".into()));

        assert_eq!(store.get(id).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn finalize_succeeds_when_not_yet_terminal() {
        let store = JobStore::new();
        let job = Job::new("alice".into(), "open wifi".into(), PathBuf::from("/tmp/run1"));
        let id = job.id;
        store.insert(job);

        store.finalize(id, JobState::Success, None);
        assert_eq!(store.get(id).unwrap().state, JobState::Success);
    }

    #[test]
    fn mark_stopped_fails_once_already_terminal() {
        let store = JobStore::new();
        let job = Job::new("alice".into(), "open wifi".into(), PathBuf::from("/tmp/run1"));
        let id = job.id;
        store.insert(job);

        store.finalize(id, JobState::Success, None);
        assert!(!store.mark_stopped(id));
        assert_eq!(store.get(id).unwrap().state, JobState::Success);
    }

    #[test]
    fn user_active_map_rejects_concurrent_second_job() {
        let map = UserActiveMap::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(map.try_acquire("alice", first).is_ok());
        assert_eq!(map.try_acquire("alice", second), Err(first));

        map.release("alice");
        assert!(map.try_acquire("alice", second).is_ok());
    }

    #[test]
    fn different_users_do_not_contend() {
        let map = UserActiveMap::new();
        assert!(map.try_acquire("alice", Uuid::new_v4()).is_ok());
        assert!(map.try_acquire("bob", Uuid::new_v4()).is_ok());
    }
}
