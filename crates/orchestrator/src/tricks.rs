//! Trick-memory glue: infers the target-app bucket, and applies a
//! task-judge's mined tricks to the shared `tricks.json` under a
//! process-wide lock (§4.9, §5).

use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use sa_agents::task_judge::TaskJudgeResponse;
use sa_domain::error::Result;
use sa_domain::tricks::{Trick, TricksFile};

/// One lock per process, guarding every `tricks.json` read-modify-write
/// regardless of which run directory it lives under — §5 calls for a
/// single process-wide lock, not one per file.
fn process_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Best-effort inference of the target-app bucket from a task's display
/// name: lowercase, non-alphanumeric runs collapsed to a single `_`.
pub fn infer_target_app(task_name: &str) -> String {
    let mut app = String::new();
    let mut last_was_sep = false;
    for ch in task_name.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            app.push(ch);
            last_was_sep = false;
        } else if !last_was_sep && !app.is_empty() {
            app.push('_');
            last_was_sep = true;
        }
    }
    while app.ends_with('_') {
        app.pop();
    }
    if app.is_empty() {
        "unknown".to_string()
    } else {
        app
    }
}

/// Merge a task-judge's mined tricks into `tricks.json`, deduplicating
/// by `(type, title, content)` (§3 invariant). Returns how many tricks
/// were newly inserted.
pub fn apply_judge_tricks(
    tricks_path: &Path,
    app: &str,
    judge: &TaskJudgeResponse,
    run_dir: &str,
    task_instruction: &str,
    created_at: &str,
) -> Result<usize> {
    let _guard = process_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let existing = fs::read_to_string(tricks_path).unwrap_or_default();
    let mut tricks_file = TricksFile::load_or_default(&existing)?;

    let task_status = format!("{:?}", judge.task_status);
    let mut inserted = 0;
    for app_trick in &judge.app_tricks {
        let trick = Trick {
            kind: app_trick.kind.clone(),
            title: app_trick.title.clone(),
            content: app_trick.content.clone(),
            tags: app_trick.tags.clone(),
            evidence_steps: app_trick
                .evidence_steps
                .iter()
                .map(|s| (*s).max(0) as u32)
                .collect(),
            created_at: created_at.to_string(),
            run_dir: run_dir.to_string(),
            task_instruction: task_instruction.to_string(),
            task_status: task_status.clone(),
        };
        if tricks_file.insert(app, trick) {
            inserted += 1;
        }
    }

    if inserted > 0 {
        fs::write(tricks_path, tricks_file.to_json()?)?;
    }
    Ok(inserted)
}

/// Render the top-K tricks for an app as a knowledge-blob fragment to
/// append to the planner's prompt (§4.9 "injected into planner
/// knowledge").
pub fn render_knowledge_fragment(tricks_path: &Path, app: &str, top_k: usize) -> String {
    let Ok(raw) = fs::read_to_string(tricks_path) else {
        return String::new();
    };
    let Ok(tricks_file) = TricksFile::load_or_default(&raw) else {
        return String::new();
    };
    let top = tricks_file.top_k(app, top_k);
    if top.is_empty() {
        return String::new();
    }
    let mut fragment = String::from("\nKnown tricks for this app:\n");
    for trick in top {
        fragment.push_str(&format!("- [{}] {}: {}\n", trick.kind, trick.title, trick.content));
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_agents::task_judge::{AppTrick, TaskStatus};

    #[test]
    fn infer_target_app_normalizes_display_name() {
        assert_eq!(infer_target_app("Wi-Fi Settings!"), "wi_fi_settings");
        assert_eq!(infer_target_app(""), "unknown");
    }

    #[test]
    fn apply_judge_tricks_dedupes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tricks.json");
        let judge = TaskJudgeResponse {
            task_status: TaskStatus::Success,
            status_reason: "done".into(),
            app_tricks: vec![AppTrick {
                kind: "navigation".into(),
                title: "wifi shortcut".into(),
                content: "swipe down twice from home".into(),
                tags: vec![],
                evidence_steps: vec![1, 2],
            }],
        };
        let inserted = apply_judge_tricks(&path, "settings", &judge, "/runs/1", "open wifi", "2026-01-01").unwrap();
        assert_eq!(inserted, 1);

        let inserted_again =
            apply_judge_tricks(&path, "settings", &judge, "/runs/2", "open wifi", "2026-01-02").unwrap();
        assert_eq!(inserted_again, 0);
    }

    #[test]
    fn render_knowledge_fragment_empty_when_no_tricks_file() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = render_knowledge_fragment(&dir.path().join("missing.json"), "settings", 3);
        assert!(fragment.is_empty());
    }
}
