//! Executor agent: turns the current subgoal into one device action (§4.6).

use sa_domain::config::PerceptionMode;
use sa_domain::state::TaskState;

use crate::sections::{parse_sections, section};

pub struct ExecutorResponse {
    pub thought: String,
    pub action_raw: String,
    pub description: String,
}

impl ExecutorResponse {
    /// True when the response is too malformed to act on (§4.7
    /// execution chain: missing Thought or Action is an `invalid` step).
    pub fn is_malformed(&self) -> bool {
        self.thought.trim().is_empty() || self.action_raw.trim().is_empty()
    }
}

pub fn parse(raw: &str) -> ExecutorResponse {
    let sections = parse_sections(raw);
    ExecutorResponse {
        thought: section(&sections, "Thought").to_string(),
        action_raw: section(&sections, "Action").to_string(),
        description: section(&sections, "Description").to_string(),
    }
}

/// Build the executor's text prompt. The action-JSON grammar example
/// varies by perception mode (§4.6: "two prompt variants... expose
/// different swipe signatures").
pub fn build_prompt(state: &TaskState, knowledge: &str, perception_mode: PerceptionMode) -> String {
    let swipe_example = match perception_mode {
        PerceptionMode::DirectCoord => {
            r#"{"action":"swipe","coordinate":[x1,y1],"coordinate2":[x2,y2],"duration":sec?}"#
        }
        PerceptionMode::MarkIndexed => {
            r#"{"action":"swipe","target":"<mark>","direction":"up|down|left|right","distance":0.1..0.9,"duration":sec?}"#
        }
    };

    format!(
        "Current subgoal: {}\n\nKnowledge:\n{}\n\nRespond with Thought, Action, Description sections. \
         Action must be a single JSON object, e.g. {swipe_example}\n",
        state.planning.current_subgoal, knowledge,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_action_is_malformed() {
        let response = ExecutorResponse {
            thought: "thinking".into(),
            action_raw: "".into(),
            description: "".into(),
        };
        assert!(response.is_malformed());
    }

    #[test]
    fn complete_response_is_not_malformed() {
        let response = ExecutorResponse {
            thought: "thinking".into(),
            action_raw: r#"{"action":"wait"}"#.into(),
            description: "waiting".into(),
        };
        assert!(!response.is_malformed());
    }

    #[test]
    fn mark_indexed_prompt_uses_target_swipe_signature() {
        let state = sa_domain::state::TaskState::new(sa_domain::state::TaskRecord {
            instruction: "x".into(),
            task_name: "x".into(),
            planner_knowledge: String::new(),
            executor_knowledge: String::new(),
            perception_mode: sa_domain::state::PerceptionMode::MarkIndexed,
        });
        let prompt = build_prompt(&state, "", PerceptionMode::MarkIndexed);
        assert!(prompt.contains("\"target\""));
    }
}
