//! Planner agent: decomposes the task into subgoals (§4.6).

use sa_domain::state::TaskState;

use crate::sections::{parse_sections, section};

pub struct PlannerResponse {
    pub thought: String,
    pub completed_subgoals: String,
    pub plan: String,
}

const NO_COMPLETED_SUBGOAL: &str = "No completed subgoal.";

impl PlannerResponse {
    /// Finalization marker (§4.9 step 5): trimmed plan contains
    /// "Finished" and is shorter than 15 characters.
    pub fn is_finished(&self) -> bool {
        let trimmed = self.plan.trim();
        trimmed.contains("Finished") && trimmed.len() < 15
    }

    /// The just-completed subgoal, or `None` for the sentinel / empty case.
    pub fn advanced_subgoal(&self) -> Option<&str> {
        let trimmed = self.completed_subgoals.trim();
        if trimmed.is_empty() || trimmed == NO_COMPLETED_SUBGOAL {
            None
        } else {
            Some(trimmed)
        }
    }
}

pub fn parse(raw: &str) -> PlannerResponse {
    let sections = parse_sections(raw);
    PlannerResponse {
        thought: section(&sections, "Thought").to_string(),
        completed_subgoals: section(&sections, "Completed Subgoals").to_string(),
        plan: section(&sections, "Plan").to_string(),
    }
}

/// Build the planner's text prompt from current task state (§4.6).
/// Images are attached separately by the caller via `AgentClient::invoke`.
pub fn build_prompt(state: &TaskState, knowledge: &str) -> String {
    let mut prompt = format!(
        "Task instruction: {}\n\nKnowledge:\n{}\n\nCompleted plan summary:\n{}\n\nCurrent plan:\n{}\n",
        state.task.instruction,
        knowledge,
        state.planning.completed_plan_summary,
        state.planning.plan_text,
    );
    if state.step == 0 {
        prompt.push_str(
            "\nThis is the first step of the task. Respond with only the Thought and Plan sections.\n",
        );
    } else {
        prompt.push_str(
            "\nRespond with Thought, Completed Subgoals, and Plan sections.\n",
        );
    }
    prompt
}
