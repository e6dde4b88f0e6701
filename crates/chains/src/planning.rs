//! Planning chain: glue between the planner agent and task state (§4.7).

use sa_agents::{planner, AgentClient};
use sa_domain::action::Action;
use sa_domain::error::Result;
use sa_domain::state::TaskState;

use crate::AgentCallLog;

/// Decide whether the planner should be skipped this step: true iff the
/// previous action was `invalid` and replanning hasn't been forced by
/// repeated failures (§4.9 steps 2-3).
pub fn should_skip(state: &TaskState, force_run: bool) -> bool {
    !force_run && matches!(state.execution.last_action(), Some(Action::Invalid { .. }))
}

/// Run the planner unconditionally. Callers decide whether to call this
/// at all via [`should_skip`], since only the caller knows whether the
/// error flag is raised (§4.9 steps 2-3).
pub async fn run(state: &mut TaskState, client: &AgentClient, knowledge: &str) -> Result<AgentCallLog> {
    let prompt = planner::build_prompt(state, knowledge);
    let output = client.invoke(prompt.clone(), &[]).await?;
    let response = planner::parse(&output.raw_text);

    state.planning.plan_text = response.plan.clone();
    if let Some(subgoal) = response.advanced_subgoal() {
        state.planning.completed_plan_log.push(subgoal.to_string());
    }
    state.planning.current_subgoal = first_n_subgoals(&response.plan, state.planning.current_subgoal_window);

    Ok(AgentCallLog {
        usage: output.usage,
        prompt,
        raw_response: output.raw_text,
    })
}

/// True iff the planner's latest plan is the finalization marker.
pub fn is_finished(plan_text: &str) -> bool {
    let trimmed = plan_text.trim();
    trimmed.contains("Finished") && trimmed.len() < 15
}

fn first_n_subgoals(plan: &str, n: usize) -> String {
    plan.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(n.max(1))
        .collect::<Vec<_>>()
        .join("\n")
}
