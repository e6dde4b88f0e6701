//! Trick memory: a per-app durable bucket of reusable notes mined from
//! task-judge output, deduplicated and injected into future planner
//! prompts (§4.9, §5 "tricks file is shared... under a process-wide lock",
//! §8 "never contains two entries with identical (type,title,content)").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trick {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence_steps: Vec<u32>,
    pub created_at: String,
    pub run_dir: String,
    pub task_instruction: String,
    pub task_status: String,
}

impl Trick {
    fn dedup_key(&self) -> (&str, &str, &str) {
        (&self.kind, &self.title, &self.content)
    }
}

/// `tricks.json`: per-app buckets of `Trick`, keyed by inferred target-app
/// name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TricksFile {
    #[serde(flatten)]
    pub apps: HashMap<String, Vec<Trick>>,
}

impl TricksFile {
    pub fn load_or_default(json: &str) -> serde_json::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Insert a trick into an app's bucket, skipping it if an entry with
    /// the same `(type, title, content)` already exists there.
    pub fn insert(&mut self, app: &str, trick: Trick) -> bool {
        let bucket = self.apps.entry(app.to_string()).or_default();
        if bucket.iter().any(|t| t.dedup_key() == trick.dedup_key()) {
            return false;
        }
        bucket.push(trick);
        true
    }

    /// Top-K most recent tricks for an app (for planner knowledge
    /// injection, §4.9).
    pub fn top_k(&self, app: &str, k: usize) -> Vec<&Trick> {
        self.apps
            .get(app)
            .map(|bucket| bucket.iter().rev().take(k).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trick(content: &str) -> Trick {
        Trick {
            kind: "navigation".into(),
            title: "settings shortcut".into(),
            content: content.into(),
            tags: vec![],
            evidence_steps: vec![1, 2],
            created_at: "2026-01-01T00:00:00Z".into(),
            run_dir: "/runs/abc".into(),
            task_instruction: "open settings".into(),
            task_status: "Success".into(),
        }
    }

    #[test]
    fn insert_deduplicates_by_type_title_content() {
        let mut tricks = TricksFile::default();
        assert!(tricks.insert("com.android.settings", sample_trick("swipe down twice")));
        assert!(!tricks.insert("com.android.settings", sample_trick("swipe down twice")));
        assert_eq!(tricks.apps["com.android.settings"].len(), 1);
    }

    #[test]
    fn different_content_is_not_a_duplicate() {
        let mut tricks = TricksFile::default();
        tricks.insert("app", sample_trick("a"));
        tricks.insert("app", sample_trick("b"));
        assert_eq!(tricks.apps["app"].len(), 2);
    }

    #[test]
    fn separate_apps_have_independent_buckets() {
        let mut tricks = TricksFile::default();
        tricks.insert("app1", sample_trick("x"));
        tricks.insert("app2", sample_trick("x"));
        assert_eq!(tricks.apps["app1"].len(), 1);
        assert_eq!(tricks.apps["app2"].len(), 1);
    }

    #[test]
    fn top_k_returns_most_recent_first() {
        let mut tricks = TricksFile::default();
        tricks.insert("app", sample_trick("first"));
        tricks.insert("app", sample_trick("second"));
        tricks.insert("app", sample_trick("third"));
        let top = tricks.top_k("app", 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].content, "third");
        assert_eq!(top[1].content, "second");
    }

    #[test]
    fn top_k_missing_app_is_empty() {
        let tricks = TricksFile::default();
        assert!(tricks.top_k("missing", 3).is_empty());
    }

    #[test]
    fn load_or_default_handles_empty_string() {
        let tricks = TricksFile::load_or_default("").unwrap();
        assert!(tricks.apps.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let mut tricks = TricksFile::default();
        tricks.insert("app", sample_trick("x"));
        let json = tricks.to_json().unwrap();
        let loaded = TricksFile::load_or_default(&json).unwrap();
        assert_eq!(loaded.apps["app"].len(), 1);
    }
}
