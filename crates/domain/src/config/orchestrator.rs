use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outer step-loop configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "d_max_steps")]
    pub max_steps: u32,
    /// Number of trailing outcomes that must all be in {B,C,N} before
    /// `error_flag_plan` is raised.
    #[serde(default = "d_replan_threshold_k")]
    pub replan_threshold_k: usize,
    /// Leading subgoal count considered "current" in planner prompts.
    #[serde(default = "d_current_subgoal_window")]
    pub current_subgoal_window: usize,
    #[serde(default = "d_path_summary_every_n_steps")]
    pub path_summary_every_n_steps: u32,
    #[serde(default)]
    pub task_judge_enabled: bool,
    #[serde(default = "d_true")]
    pub recorder_enabled: bool,
    #[serde(default = "d_trick_top_k")]
    pub trick_injection_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: d_max_steps(),
            replan_threshold_k: d_replan_threshold_k(),
            current_subgoal_window: d_current_subgoal_window(),
            path_summary_every_n_steps: d_path_summary_every_n_steps(),
            task_judge_enabled: false,
            recorder_enabled: true,
            trick_injection_top_k: d_trick_top_k(),
        }
    }
}

fn d_max_steps() -> u32 {
    25
}
fn d_replan_threshold_k() -> usize {
    2
}
fn d_current_subgoal_window() -> usize {
    1
}
fn d_path_summary_every_n_steps() -> u32 {
    5
}
fn d_true() -> bool {
    true
}
fn d_trick_top_k() -> usize {
    3
}
