//! TaskJudge agent: judges task completion and mines reusable tricks
//! (§4.6, §9 Open Question c). Accepts either bare JSON or a
//! `### TaskJudge ###`-sectioned equivalent.

use serde::{Deserialize, Serialize};

use crate::sections::parse_sections;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTrick {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence_steps: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct TaskJudgeResponse {
    pub task_status: TaskStatus,
    pub status_reason: String,
    pub app_tricks: Vec<AppTrick>,
}

pub fn parse(raw: &str) -> Option<TaskJudgeResponse> {
    if let Some(response) = try_parse_bare(raw) {
        return Some(response);
    }
    let sections = parse_sections(raw);
    sections.values().find_map(|body| try_parse_bare(body))
}

fn try_parse_bare(text: &str) -> Option<TaskJudgeResponse> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let value: serde_json::Value = serde_json::from_str(cleaned.trim()).ok()?;
    let status_raw = value.get("task_status")?.as_str()?;
    let task_status = match status_raw.to_lowercase().as_str() {
        "success" => TaskStatus::Success,
        "failed" => TaskStatus::Failed,
        _ => return None,
    };
    let status_reason = value
        .get("status_reason")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let app_tricks = value
        .get("app_tricks")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    Some(TaskJudgeResponse {
        task_status,
        status_reason,
        app_tricks,
    })
}

pub fn build_prompt(goal: &str, completed_plan_summary: &str) -> String {
    format!(
        "Task goal: {goal}\n\nCompleted plan summary:\n{completed_plan_summary}\n\n\
         Respond with a single JSON object: {{\"task_status\": \"Success\"|\"Failed\", \
         \"status_reason\": \"...\", \"app_tricks\": [{{\"type\":\"...\", \"title\":\"...\", \
         \"content\":\"...\", \"tags\":[...], \"evidence_steps\":[...]}}]}}\n"
    )
}
