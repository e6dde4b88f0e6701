//! Execution chain: turns the current subgoal into a device action (§4.7).

use std::time::Duration;

use sa_agents::{executor, AgentClient};
use sa_device::DeviceDriver;
use sa_domain::action::Action;
use sa_domain::config::CoordinateConvention;
use sa_domain::error::Result;
use sa_domain::som::SomMap;
use sa_domain::state::{Outcome, TaskState};
use sa_domain::stream::Usage;
use sa_perception::action_service;

use crate::AgentCallLog;

pub struct ExecutionResult {
    pub usage: Option<Usage>,
    /// Set when a mark-anchored click/swipe resolved against `marks`.
    pub last_used_mark: Option<String>,
    pub prompt: String,
    pub raw_response: String,
}

pub async fn run(
    state: &mut TaskState,
    client: &AgentClient,
    driver: &dyn DeviceDriver,
    marks: &SomMap,
    convention: CoordinateConvention,
    width: u32,
    height: u32,
    knowledge: &str,
) -> Result<ExecutionResult> {
    let prompt = executor::build_prompt(state, knowledge, perception_mode(state));
    let output = client.invoke(prompt.clone(), &[]).await?;
    let response = executor::parse(&output.raw_text);

    if response.is_malformed() {
        return Ok(finalize_invalid(state, "missing Thought or Action", prompt, output));
    }

    let Some(action) = Action::parse(&response.action_raw) else {
        return Ok(finalize_invalid(state, "unparseable action JSON", prompt, output));
    };

    let is_first_step = state.step == 0;
    state
        .execution
        .record_action(action.clone(), response.description.clone(), Some(response.thought.clone()));

    if matches!(action, Action::Answer { .. }) {
        state.execution.record_outcome(Outcome::S, String::new());
        return Ok(ExecutionResult {
            usage: output.usage,
            last_used_mark: None,
            prompt,
            raw_response: output.raw_text,
        });
    }

    let executed = action_service::execute(driver, &action, marks, convention, width, height).await;

    let sleep_secs = if is_first_step { 8 } else { 2 };
    tokio::time::sleep(Duration::from_secs(sleep_secs)).await;

    Ok(ExecutionResult {
        usage: output.usage,
        last_used_mark: executed.last_used_mark,
        prompt,
        raw_response: output.raw_text,
    })
}

fn perception_mode(state: &TaskState) -> sa_domain::config::PerceptionMode {
    match state.task.perception_mode {
        sa_domain::state::PerceptionMode::DirectCoord => sa_domain::config::PerceptionMode::DirectCoord,
        sa_domain::state::PerceptionMode::MarkIndexed => sa_domain::config::PerceptionMode::MarkIndexed,
    }
}

fn finalize_invalid(
    state: &mut TaskState,
    reason: &str,
    prompt: String,
    output: sa_agents::AgentOutput,
) -> ExecutionResult {
    state.execution.record_action(
        Action::Invalid { reason: reason.to_string() },
        String::new(),
        None,
    );
    state.execution.record_outcome(Outcome::N, String::new());
    ExecutionResult {
        usage: output.usage,
        last_used_mark: None,
        prompt,
        raw_response: output.raw_text,
        last_used_mark: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sa_domain::config::RoleModelConfig;
    use sa_domain::error::Result as SaResult;
    use sa_domain::stream::{BoxStream, StreamEvent};
    use sa_domain::capability::LlmCapabilities;
    use sa_domain::state::{PerceptionMode, TaskRecord};
    use sa_providers::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
    use std::path::Path;
    use std::sync::Arc;

    struct ScriptedProvider {
        text: String,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _req: ChatRequest) -> SaResult<ChatResponse> {
            Ok(ChatResponse {
                content: self.text.clone(),
                tool_calls: Vec::new(),
                usage: None,
                model: "scripted".into(),
                finish_reason: Some("stop".into()),
            })
        }
        async fn chat_stream(&self, _req: ChatRequest) -> SaResult<BoxStream<'static, SaResult<StreamEvent>>> {
            unimplemented!("not used in execution chain tests")
        }
        async fn embeddings(&self, _req: EmbeddingsRequest) -> SaResult<EmbeddingsResponse> {
            unimplemented!("not used in execution chain tests")
        }
        fn capabilities(&self) -> &LlmCapabilities {
            unreachable!("not used in execution chain tests")
        }
        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    struct NoopDriver;

    #[async_trait]
    impl DeviceDriver for NoopDriver {
        async fn screenshot(&self, _path: &Path) -> bool {
            true
        }
        async fn tap(&self, x: i64, y: i64) -> String {
            format!("tap {x} {y}")
        }
        async fn type_text(&self, _text: &str) -> String {
            String::new()
        }
        async fn delete(&self, _count: u32) -> String {
            String::new()
        }
        async fn swipe(&self, _x1: i64, _y1: i64, _x2: i64, _y2: i64, _duration_ms: u64) -> String {
            String::new()
        }
        async fn drag(&self, _x1: i64, _y1: i64, _x2: i64, _y2: i64, _duration_ms: u64) -> String {
            String::new()
        }
        async fn back(&self) -> String {
            String::new()
        }
        async fn home(&self) -> String {
            String::new()
        }
    }

    fn sample_state() -> TaskState {
        TaskState::new(TaskRecord {
            instruction: "open wifi settings".into(),
            task_name: "wifi".into(),
            planner_knowledge: String::new(),
            executor_knowledge: String::new(),
            perception_mode: PerceptionMode::DirectCoord,
        })
    }

    fn client_with(text: &str) -> AgentClient {
        AgentClient::new(
            Arc::new(ScriptedProvider { text: text.to_string() }),
            RoleModelConfig::default(),
        )
    }

    #[tokio::test]
    async fn malformed_response_records_invalid_and_outcome_n() {
        let mut state = sample_state();
        let client = client_with("no sections here at all");
        let driver = NoopDriver;
        let marks = SomMap::new();
        let result = run(&mut state, &client, &driver, &marks, CoordinateConvention::Absolute, 1080, 2400, "").await.unwrap();
        assert!(result.last_used_mark.is_none());
        assert!(matches!(state.execution.last_action(), Some(Action::Invalid { .. })));
        assert!(state.execution.is_quiescent());
    }

    #[tokio::test]
    async fn answer_action_records_success_without_device_call() {
        let mut state = sample_state();
        let raw = "### Thought ###\ndone\n### Action ###\n{\"action\":\"answer\",\"text\":\"ok\"}\n### Description ###\nfinished";
        let client = client_with(raw);
        let driver = NoopDriver;
        let marks = SomMap::new();
        let result = run(&mut state, &client, &driver, &marks, CoordinateConvention::Absolute, 1080, 2400, "").await.unwrap();
        assert!(result.last_used_mark.is_none());
        assert_eq!(state.execution.outcomes.last(), Some(&Outcome::S));
    }

    #[tokio::test]
    async fn valid_click_executes_against_driver() {
        let mut state = sample_state();
        let raw = "### Thought ###\ntap ok\n### Action ###\n{\"action\":\"click\",\"coordinate\":[10,20]}\n### Description ###\ntapping ok";
        let client = client_with(raw);
        let driver = NoopDriver;
        let marks = SomMap::new();
        let result = run(&mut state, &client, &driver, &marks, CoordinateConvention::Absolute, 1080, 2400, "").await.unwrap();
        assert!(result.last_used_mark.is_none());
        assert!(matches!(state.execution.last_action(), Some(Action::Click { .. })));
        assert!(!state.execution.is_quiescent());
    }
}
