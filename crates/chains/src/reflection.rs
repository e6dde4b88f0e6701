//! Reflection chain: judges the pre/post screenshot pair, runs the
//! stagnation checker, and drives the periodic summarizer/recorder
//! cadence (§4.7).

use sa_agents::{path_summarizer, recorder, reflector, AgentClient};
use sa_domain::error::Result;
use sa_domain::state::{Outcome, TaskState};
use sa_domain::stream::Usage;

use crate::{stagnation, AgentCallLog};

pub struct ReflectionOutcome {
    pub outcome: Outcome,
    pub usage: Option<Usage>,
    /// Absent when the quiescent fast path skipped the reflector entirely.
    pub prompt: Option<String>,
    pub raw_response: Option<String>,
}

/// Run the reflector unless the execution chain already finalized this
/// step's outcome (the `invalid`/`answer` fast paths, §4.7). In that
/// case the already-recorded outcome is returned as-is so the caller's
/// summarizer/recorder cadence still applies uniformly.
pub async fn run(
    state: &mut TaskState,
    client: &AgentClient,
    pre_screenshot: &str,
    post_screenshot: &str,
    pre_xml: &str,
    post_xml: &str,
    stagnation_enabled: bool,
    stagnation_threshold: f64,
) -> Result<ReflectionOutcome> {
    if state.execution.is_quiescent() {
        let outcome = *state
            .execution
            .outcomes
            .last()
            .expect("quiescent implies at least one outcome was just recorded");
        return Ok(ReflectionOutcome {
            outcome,
            usage: None,
            prompt: None,
            raw_response: None,
        });
    }

    let description = state.execution.last_description().unwrap_or_default().to_string();
    let prompt = reflector::build_prompt(&description);
    let images = vec![pre_screenshot.to_string(), post_screenshot.to_string()];
    let output = client.invoke(prompt.clone(), &images).await?;
    let response = reflector::parse(&output.raw_text);

    let mut outcome = response.outcome;
    if matches!(outcome, Outcome::C) && stagnation_enabled {
        let (_, confirmed) = stagnation::check(pre_xml, post_xml, stagnation_threshold);
        outcome = if confirmed { Outcome::N } else { Outcome::S };
    }

    state.execution.record_outcome(outcome, response.error_description);
    state.reflection.pre_screenshot = Some(pre_screenshot.to_string());
    state.reflection.post_screenshot = Some(post_screenshot.to_string());

    Ok(ReflectionOutcome {
        outcome,
        usage: output.usage,
        prompt: Some(prompt),
        raw_response: Some(output.raw_text),
    })
}

/// `(step+1) mod 5 == 0 && outcome == S` (§4.7): compress the completed
/// plan log and replace `completed_plan_summary`.
pub async fn maybe_summarize(
    state: &mut TaskState,
    client: &AgentClient,
    outcome: Outcome,
    every_n_steps: u32,
) -> Result<Option<AgentCallLog>> {
    let due = every_n_steps > 0 && (state.step + 1) % every_n_steps == 0;
    if !due || !matches!(outcome, Outcome::S) {
        return Ok(None);
    }
    let prompt = path_summarizer::build_prompt(&state.planning.completed_plan_log);
    let output = client.invoke(prompt.clone(), &[]).await?;
    let response = path_summarizer::parse(&output.raw_text);
    state.planning.completed_plan_summary = response.summary;
    Ok(Some(AgentCallLog {
        usage: output.usage,
        prompt,
        raw_response: output.raw_text,
    }))
}

/// Notes are enabled and outcome == S (§4.7): record durable notes,
/// possibly echoing the prior notes verbatim.
pub async fn maybe_record_notes(
    state: &mut TaskState,
    client: &AgentClient,
    outcome: Outcome,
    notes_enabled: bool,
) -> Result<Option<AgentCallLog>> {
    if !notes_enabled || !matches!(outcome, Outcome::S) {
        return Ok(None);
    }
    let description = state.execution.last_description().unwrap_or_default();
    let prompt = recorder::build_prompt(&state.reflection.important_notes, description);
    let output = client.invoke(prompt.clone(), &[]).await?;
    let response = recorder::parse(&output.raw_text);
    state.reflection.important_notes = response.important_notes;
    Ok(Some(AgentCallLog {
        usage: output.usage,
        prompt,
        raw_response: output.raw_text,
    }))
}
