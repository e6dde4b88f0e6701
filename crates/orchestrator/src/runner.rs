//! The outer step loop (§4.9): wires the planning/execution/reflection
//! chains together, drives screenshot capture, and persists per-run
//! artifacts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use sa_agents::{task_judge, AgentClient};
use sa_chains::{execution, planning, reflection};
use sa_device::DeviceDriver;
use sa_domain::capability::ModelRole;
use sa_domain::config::{CoordinateConvention, DeviceConfig, OrchestratorConfig, PerceptionConfig, PerceptionMode};
use sa_domain::error::{Error, Result};
use sa_domain::som::SomMap;
use sa_domain::state::{TaskRecord, TaskState};
use sa_domain::stream::Usage;
use sa_perception::screenshot;

use crate::artifacts::{self, InfopoolArtifact, ScriptArtifact, TaskResults, TestStatusReport};
use crate::tricks;

pub struct TaskRunner<'a> {
    pub driver: &'a dyn DeviceDriver,
    pub clients: HashMap<ModelRole, AgentClient>,
    pub device_config: DeviceConfig,
    pub perception_config: PerceptionConfig,
    pub orchestrator_config: OrchestratorConfig,
    pub convention: CoordinateConvention,
    pub width: u32,
    pub height: u32,
    pub run_dir: PathBuf,
    /// Sibling `tricks.json`, shared across runs of the same user (§5).
    pub tricks_path: Option<PathBuf>,
}

impl<'a> TaskRunner<'a> {
    fn client(&self, role: ModelRole) -> Result<&AgentClient> {
        self.clients
            .get(&role)
            .ok_or_else(|| Error::Config(format!("no model wired for role {role:?}")))
    }

    pub async fn run(&self, task: TaskRecord) -> Result<TaskResults> {
        let started_at = Utc::now();
        let images_dir = self.run_dir.join("images");
        fs::create_dir_all(&images_dir)?;

        let target_app = tricks::infer_target_app(&task.task_name);
        let planner_knowledge = match &self.tricks_path {
            Some(path) => format!(
                "{}{}",
                task.planner_knowledge,
                tricks::render_knowledge_fragment(path, &target_app, self.orchestrator_config.trick_injection_top_k),
            ),
            None => task.planner_knowledge.clone(),
        };
        let executor_knowledge = task.executor_knowledge.clone();
        let goal = task.instruction.clone();

        let mut state = TaskState::new(task);
        let mut token_usage: HashMap<ModelRole, Usage> = HashMap::new();
        let mut script = ScriptArtifact::default();
        let mut infopool = InfopoolArtifact::default();

        let mut step_limit = 0.0_f64;
        let mut last_after: Option<PathBuf> = None;
        let mut steps_completed = 0u32;

        loop {
            if state.step >= self.orchestrator_config.max_steps {
                step_limit = 1.0;
                self.driver.home().await;
                break;
            }

            let before_path = match &last_after {
                Some(path) => path.clone(),
                None => {
                    let frame_name = format!("step_{}_before", state.step);
                    match screenshot::capture(
                        self.driver,
                        &self.device_config,
                        &self.perception_config,
                        &images_dir,
                        &frame_name,
                    )
                    .await
                    {
                        Some(path) => path,
                        None => {
                            step_limit = 1.0;
                            self.driver.home().await;
                            break;
                        }
                    }
                }
            };

            let error_flag = state.error_flag_plan(self.orchestrator_config.replan_threshold_k);

            if !planning::should_skip(&state, error_flag) {
                let planner_client = self.client(ModelRole::Planner)?;
                let call = planning::run(&mut state, planner_client, &planner_knowledge).await?;
                artifacts::log_agent_call(
                    &self.run_dir,
                    state.step,
                    role_label(ModelRole::Planner),
                    &call.prompt,
                    &call.raw_response,
                    call.usage.as_ref(),
                )?;
                if let Some(usage) = call.usage {
                    accumulate(&mut token_usage, ModelRole::Planner, usage);
                }
            }

            if planning::is_finished(&state.planning.plan_text) {
                break;
            }

            let marks = self.marks_for(&before_path);
            let executor_client = self.client(ModelRole::Executor)?;
            let exec_result = execution::run(
                &mut state,
                executor_client,
                self.driver,
                &marks,
                self.convention,
                self.width,
                self.height,
                &executor_knowledge,
            )
            .await?;
            artifacts::log_agent_call(
                &self.run_dir,
                state.step,
                role_label(ModelRole::Executor),
                &exec_result.prompt,
                &exec_result.raw_response,
                exec_result.usage.as_ref(),
            )?;
            if let Some(usage) = exec_result.usage {
                accumulate(&mut token_usage, ModelRole::Executor, usage);
            }

            let after_frame = format!("step_{}_after", state.step);
            let after_path = match screenshot::capture(
                self.driver,
                &self.device_config,
                &self.perception_config,
                &images_dir,
                &after_frame,
            )
            .await
            {
                Some(path) => path,
                None => {
                    step_limit = 1.0;
                    self.driver.home().await;
                    break;
                }
            };

            let pre_xml = fs::read_to_string(before_path.with_extension("xml")).unwrap_or_default();
            let post_xml = fs::read_to_string(after_path.with_extension("xml")).unwrap_or_default();

            let reflector_client = self.client(ModelRole::Reflector)?;
            let reflection_outcome = reflection::run(
                &mut state,
                reflector_client,
                &before_path.display().to_string(),
                &after_path.display().to_string(),
                &pre_xml,
                &post_xml,
                self.perception_config.stagnation_enabled,
                self.perception_config.stagnation_threshold,
            )
            .await?;
            if let (Some(prompt), Some(raw_response)) = (&reflection_outcome.prompt, &reflection_outcome.raw_response) {
                artifacts::log_agent_call(
                    &self.run_dir,
                    state.step,
                    role_label(ModelRole::Reflector),
                    prompt,
                    raw_response,
                    reflection_outcome.usage.as_ref(),
                )?;
            }
            if let Some(usage) = reflection_outcome.usage {
                accumulate(&mut token_usage, ModelRole::Reflector, usage);
            }

            if let Ok(path_summarizer_client) = self.client(ModelRole::PathSummarizer) {
                if let Some(call) = reflection::maybe_summarize(
                    &mut state,
                    path_summarizer_client,
                    reflection_outcome.outcome,
                    self.orchestrator_config.path_summary_every_n_steps,
                )
                .await?
                {
                    artifacts::log_agent_call(
                        &self.run_dir,
                        state.step,
                        role_label(ModelRole::PathSummarizer),
                        &call.prompt,
                        &call.raw_response,
                        call.usage.as_ref(),
                    )?;
                    if let Some(usage) = call.usage {
                        accumulate(&mut token_usage, ModelRole::PathSummarizer, usage);
                    }
                }
            }

            if let Ok(recorder_client) = self.client(ModelRole::Recorder) {
                if let Some(call) = reflection::maybe_record_notes(
                    &mut state,
                    recorder_client,
                    reflection_outcome.outcome,
                    self.orchestrator_config.recorder_enabled,
                )
                .await?
                {
                    artifacts::log_agent_call(
                        &self.run_dir,
                        state.step,
                        role_label(ModelRole::Recorder),
                        &call.prompt,
                        &call.raw_response,
                        call.usage.as_ref(),
                    )?;
                    if let Some(usage) = call.usage {
                        accumulate(&mut token_usage, ModelRole::Recorder, usage);
                    }
                }
            }

            let subgoal = state.planning.current_subgoal.clone();
            let command = state.execution.last_description().unwrap_or_default().to_string();
            let mode = Some(perception_mode_label(self.perception_config.mode));
            script.append_step(
                &subgoal,
                &command,
                &before_path.display().to_string(),
                &after_path.display().to_string(),
                mode.as_deref(),
                exec_result.last_used_mark.as_deref(),
            );
            infopool.append_step(
                &state.planning.plan_text,
                state.planning.completed_plan_log.last().map(String::as_str).unwrap_or(""),
                &state.planning.completed_plan_summary,
                &state.reflection.progress_status,
            );

            steps_completed += 1;
            last_after = Some(after_path);
            state.step += 1;
        }

        script.total_plan = state.planning.completed_plan_summary.clone();
        infopool.total_plan = state.planning.plan_text.clone();
        script.write(&self.run_dir)?;
        infopool.write(&self.run_dir)?;

        let mut task_status = if step_limit > 0.0 { "Not Completed".to_string() } else { "Completed".to_string() };
        let mut test_status_report = None;

        if self.orchestrator_config.task_judge_enabled && step_limit == 0.0 {
            if let Ok(judge_client) = self.client(ModelRole::TaskJudge) {
                let prompt = task_judge::build_prompt(&goal, &state.planning.completed_plan_summary);
                let output = judge_client.invoke(prompt.clone(), &[]).await?;
                artifacts::log_agent_call(
                    &self.run_dir,
                    state.step,
                    role_label(ModelRole::TaskJudge),
                    &prompt,
                    &output.raw_text,
                    output.usage.as_ref(),
                )?;
                if let Some(judge) = task_judge::parse(&output.raw_text) {
                    task_status = format!("{:?}", judge.task_status);
                    let mined = if let Some(path) = &self.tricks_path {
                        tricks::apply_judge_tricks(
                            path,
                            &target_app,
                            &judge,
                            &self.run_dir.display().to_string(),
                            &goal,
                            &started_at.to_rfc3339(),
                        )?
                    } else {
                        0
                    };
                    test_status_report = Some(TestStatusReport {
                        status_reason: judge.status_reason,
                        app_tricks_mined: mined,
                    });
                    if let Some(usage) = output.usage {
                        accumulate(&mut token_usage, ModelRole::TaskJudge, usage);
                    }
                }
            }
        }

        if test_status_report.is_none() && step_limit > 0.0 {
            test_status_report = Some(TestStatusReport {
                status_reason: "Reached maximum execution limit".to_string(),
                app_tricks_mined: 0,
            });
        }

        let total_tokens = token_usage.values().map(|u| u.total_tokens).sum();
        let results = TaskResults {
            goal,
            started_at,
            finished_at: Utc::now(),
            step_limit,
            task_status,
            test_status_report,
            token_usage: token_usage
                .into_iter()
                .map(|(role, usage)| (role_label(role).to_string(), usage))
                .collect(),
            total_tokens,
            execution_steps: steps_completed,
        };
        results.write(&self.run_dir)?;

        Ok(results)
    }

    /// Load the `SomMap` sibling of a mark-indexed capture, or an empty
    /// map in direct-coord mode / on any read failure.
    fn marks_for(&self, path: &Path) -> SomMap {
        if !matches!(self.perception_config.mode, PerceptionMode::MarkIndexed) {
            return SomMap::new();
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return SomMap::new();
        };
        let frame_name = stem.strip_suffix("_marked").unwrap_or(stem);
        let Some(dir) = path.parent() else {
            return SomMap::new();
        };
        let mapping_path = dir.join(format!("{frame_name}_mapping.json"));
        fs::read_to_string(mapping_path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }
}

fn accumulate(usage_by_role: &mut HashMap<ModelRole, Usage>, role: ModelRole, usage: Usage) {
    let entry = usage_by_role.entry(role).or_insert(Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    });
    entry.prompt_tokens += usage.prompt_tokens;
    entry.completion_tokens += usage.completion_tokens;
    entry.total_tokens += usage.total_tokens;
}

fn role_label(role: ModelRole) -> &'static str {
    match role {
        ModelRole::Planner => "planner",
        ModelRole::Executor => "executor",
        ModelRole::Summarizer => "summarizer",
        ModelRole::Embedder => "embedder",
        ModelRole::Reflector => "reflector",
        ModelRole::Recorder => "recorder",
        ModelRole::PathSummarizer => "path_summarizer",
        ModelRole::TaskJudge => "task_judge",
    }
}

fn perception_mode_label(mode: PerceptionMode) -> &'static str {
    match mode {
        PerceptionMode::DirectCoord => "direct_coord",
        PerceptionMode::MarkIndexed => "mark_indexed",
    }
}
