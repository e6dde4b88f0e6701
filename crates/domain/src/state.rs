//! The in-memory task state record (§3 Data Model, §4.9 invariants).
//!
//! Owned exclusively by the worker running one task — no internal
//! locking (§5: "all state mutations for a given task are performed on
//! the worker thread/goroutine that owns that task").

use serde::{Deserialize, Serialize};

use crate::action::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionMode {
    DirectCoord,
    MarkIndexed,
}

/// One task per run (§3 Task record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub instruction: String,
    pub task_name: String,
    /// Opaque knowledge blob injected into the planner's prompt (tricks,
    /// prior-run summaries — content is a collaborator concern).
    pub planner_knowledge: String,
    /// Opaque knowledge blob injected into the executor's prompt.
    pub executor_knowledge: String,
    pub perception_mode: PerceptionMode,
}

/// The current plan and its bookkeeping (§3 Planning record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRecord {
    /// Numbered-list text, or the literal `"Finished"`.
    pub plan_text: String,
    /// Append-only full log of subgoals marked done.
    pub completed_plan_log: Vec<String>,
    /// Compressed form used in prompts; monotonic (append/replace only
    /// by the path-summarizer — §3 invariant).
    pub completed_plan_summary: String,
    pub current_subgoal: String,
    /// Leading-subgoal window size considered "current" (default 1).
    pub current_subgoal_window: usize,
    pub replan_needed: bool,
    pub replan_threshold_k: usize,
}

impl Default for PlanningRecord {
    fn default() -> Self {
        Self {
            plan_text: String::new(),
            completed_plan_log: Vec::new(),
            completed_plan_summary: String::new(),
            current_subgoal: String::new(),
            current_subgoal_window: 1,
            replan_needed: false,
            replan_threshold_k: 2,
        }
    }
}

/// Outcome letters recorded by the reflection chain (§7, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Success / partial progress.
    S,
    /// Wrong page — semantic failure.
    B,
    /// No material change detected.
    C,
    /// Invalid/stale action (internal; never emitted by the model).
    N,
}

impl Outcome {
    /// True for outcomes that count toward the replan threshold (§4.9.2).
    pub fn counts_as_error(self) -> bool {
        matches!(self, Outcome::B | Outcome::C | Outcome::N)
    }
}

/// Four parallel sequences kept in lockstep (§3 invariant: equal length
/// at every quiescent point).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub actions: Vec<Action>,
    pub descriptions: Vec<String>,
    pub outcomes: Vec<Outcome>,
    pub error_descriptions: Vec<String>,
    pub last_thought: Option<String>,
}

impl ExecutionRecord {
    /// Append one step's action + description; outcome/error description
    /// follow later via `record_outcome` once the reflection chain runs.
    pub fn record_action(&mut self, action: Action, description: String, thought: Option<String>) {
        self.actions.push(action);
        self.descriptions.push(description);
        self.last_thought = thought;
    }

    /// Append the outcome + error description for the most recent action.
    /// Keeps the four sequences equal-length.
    pub fn record_outcome(&mut self, outcome: Outcome, error_description: String) {
        self.outcomes.push(outcome);
        self.error_descriptions.push(error_description);
    }

    /// True at any quiescent point (all four sequences equal length).
    pub fn is_quiescent(&self) -> bool {
        let n = self.actions.len();
        self.descriptions.len() == n && self.outcomes.len() == n && self.error_descriptions.len() == n
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn last_description(&self) -> Option<&str> {
        self.descriptions.last().map(String::as_str)
    }

    /// Last `k` outcomes, most-recent last; fewer than `k` if history is short.
    pub fn last_k_outcomes(&self, k: usize) -> &[Outcome] {
        let n = self.outcomes.len();
        &self.outcomes[n.saturating_sub(k)..]
    }
}

/// Reflector state (§3 Reflection record).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectionRecord {
    pub progress_status: String,
    pub status_history: Vec<String>,
    pub important_notes: String,
    pub pre_screenshot: Option<String>,
    pub post_screenshot: Option<String>,
}

impl ReflectionRecord {
    pub fn set_progress(&mut self, status: impl Into<String>) {
        let status = status.into();
        self.status_history.push(status.clone());
        self.progress_status = status;
    }
}

/// The full per-task state aggregate mutated only by the chains (§3
/// Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task: TaskRecord,
    pub planning: PlanningRecord,
    pub execution: ExecutionRecord,
    pub reflection: ReflectionRecord,
    /// Step index of the next step about to run (0-based).
    pub step: u32,
}

impl TaskState {
    pub fn new(task: TaskRecord) -> Self {
        Self {
            task,
            planning: PlanningRecord::default(),
            execution: ExecutionRecord::default(),
            reflection: ReflectionRecord::default(),
            step: 0,
        }
    }

    /// `error_flag_plan` (§4.9.2): true iff the last `k` outcomes are all
    /// error-counting (B, C, or N). False while history is shorter than k.
    pub fn error_flag_plan(&self, k: usize) -> bool {
        let last_k = self.execution.last_k_outcomes(k);
        last_k.len() == k && last_k.iter().all(|o| o.counts_as_error())
    }

    /// Byte-stable JSON snapshot (§8 round-trip property: snapshot ->
    /// load -> snapshot is byte-equal).
    pub fn snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_snapshot(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskRecord {
        TaskRecord {
            instruction: "open settings".into(),
            task_name: "open_settings".into(),
            planner_knowledge: String::new(),
            executor_knowledge: String::new(),
            perception_mode: PerceptionMode::DirectCoord,
        }
    }

    #[test]
    fn new_state_is_quiescent() {
        let state = TaskState::new(sample_task());
        assert!(state.execution.is_quiescent());
    }

    #[test]
    fn record_action_then_outcome_stays_quiescent() {
        let mut state = TaskState::new(sample_task());
        state
            .execution
            .record_action(Action::Wait, "waiting".into(), Some("thinking".into()));
        assert!(!state.execution.is_quiescent());
        state.execution.record_outcome(Outcome::S, String::new());
        assert!(state.execution.is_quiescent());
    }

    #[test]
    fn error_flag_plan_requires_full_window_of_errors() {
        let mut state = TaskState::new(sample_task());
        for outcome in [Outcome::S, Outcome::C] {
            state
                .execution
                .record_action(Action::Wait, String::new(), None);
            state.execution.record_outcome(outcome, String::new());
        }
        // last 2 = [S, C] -> not all errors
        assert!(!state.error_flag_plan(2));

        state
            .execution
            .record_action(Action::Wait, String::new(), None);
        state.execution.record_outcome(Outcome::N, String::new());
        // last 2 = [C, N] -> all errors
        assert!(state.error_flag_plan(2));
    }

    #[test]
    fn error_flag_plan_false_when_history_shorter_than_k() {
        let mut state = TaskState::new(sample_task());
        state
            .execution
            .record_action(Action::Wait, String::new(), None);
        state.execution.record_outcome(Outcome::C, String::new());
        assert!(!state.error_flag_plan(2));
    }

    #[test]
    fn snapshot_round_trip_is_byte_equal() {
        let mut state = TaskState::new(sample_task());
        state
            .execution
            .record_action(Action::Wait, "waiting".into(), None);
        state.execution.record_outcome(Outcome::S, String::new());

        let snapshot1 = state.snapshot().unwrap();
        let loaded = TaskState::from_snapshot(&snapshot1).unwrap();
        let snapshot2 = loaded.snapshot().unwrap();
        assert_eq!(snapshot1, snapshot2);
    }

    #[test]
    fn outcome_counts_as_error_excludes_success() {
        assert!(!Outcome::S.counts_as_error());
        assert!(Outcome::B.counts_as_error());
        assert!(Outcome::C.counts_as_error());
        assert!(Outcome::N.counts_as_error());
    }

    #[test]
    fn reflection_record_tracks_history() {
        let mut reflection = ReflectionRecord::default();
        reflection.set_progress("started");
        reflection.set_progress("halfway");
        assert_eq!(reflection.progress_status, "halfway");
        assert_eq!(reflection.status_history, vec!["started", "halfway"]);
    }
}
