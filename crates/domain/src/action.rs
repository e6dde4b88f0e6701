use serde::{Deserialize, Serialize};

/// A device click/swipe coordinate target: either a resolved pixel pair
/// or a set-of-mark index string (resolved later against a `SomMap`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordTarget {
    Point([i64; 2]),
    Mark(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SystemButton {
    Back,
    Home,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// The model-emitted action grammar (§6 Action JSON).
///
/// Deserialized directly from the executor's raw JSON via the
/// `action` discriminant field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Answer {
        text: String,
    },
    Click {
        coordinate: CoordTarget,
    },
    Type {
        text: String,
    },
    Delete {
        #[serde(default = "d_one")]
        count: u32,
    },
    Wait,
    SystemButton {
        button: SystemButton,
    },
    Swipe {
        #[serde(default)]
        coordinate: Option<[i64; 2]>,
        #[serde(default)]
        coordinate2: Option<[i64; 2]>,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        direction: Option<SwipeDirection>,
        #[serde(default)]
        distance: Option<f64>,
        /// Seconds, matching the model's wire convention; converted to
        /// milliseconds before device dispatch.
        #[serde(default)]
        duration: Option<f64>,
    },
    /// Not part of the model grammar: a parse/shape failure recorded as a
    /// pseudo-action so the execution sequences stay aligned (§4.7, §7.1).
    Invalid {
        reason: String,
    },
}

fn d_one() -> u32 {
    1
}

impl Action {
    /// Short tag used for script/infopool logging and state history.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Answer { .. } => "answer",
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Delete { .. } => "delete",
            Action::Wait => "wait",
            Action::SystemButton { .. } => "system_button",
            Action::Swipe { .. } => "swipe",
            Action::Invalid { .. } => "invalid",
        }
    }

    /// Strip code fences and a leading `json` hint, then parse the
    /// executor's raw action text into an `Action`.
    ///
    /// Returns `None` (never `Invalid`) on failure — callers decide how to
    /// represent the parse failure in state; this mirrors spec.md's
    /// `parse_action(raw) -> Action | null` contract exactly.
    pub fn parse(raw: &str) -> Option<Action> {
        let cleaned = raw.replace("```json", "").replace("```", "");
        let cleaned = cleaned.trim();
        serde_json::from_str(cleaned).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_click_with_point_coordinate() {
        let raw = r#"{"action":"click","coordinate":[120,400]}"#;
        let action = Action::parse(raw).unwrap();
        assert_eq!(
            action,
            Action::Click {
                coordinate: CoordTarget::Point([120, 400])
            }
        );
    }

    #[test]
    fn parse_click_with_mark_coordinate() {
        let raw = r#"{"action":"click","coordinate":"3"}"#;
        let action = Action::parse(raw).unwrap();
        assert_eq!(
            action,
            Action::Click {
                coordinate: CoordTarget::Mark("3".into())
            }
        );
    }

    #[test]
    fn parse_strips_code_fences() {
        let raw = "```json\n{\"action\":\"wait\"}\n```";
        assert_eq!(Action::parse(raw).unwrap(), Action::Wait);
    }

    #[test]
    fn parse_answer() {
        let raw = r#"{"action":"answer","text":"done"}"#;
        assert_eq!(
            Action::parse(raw).unwrap(),
            Action::Answer { text: "done".into() }
        );
    }

    #[test]
    fn parse_system_button() {
        let raw = r#"{"action":"system_button","button":"Back"}"#;
        assert_eq!(
            Action::parse(raw).unwrap(),
            Action::SystemButton {
                button: SystemButton::Back
            }
        );
    }

    #[test]
    fn parse_mark_anchored_swipe() {
        let raw = r#"{"action":"swipe","target":"5","direction":"up","distance":0.6}"#;
        let action = Action::parse(raw).unwrap();
        match action {
            Action::Swipe {
                target, direction, distance, ..
            } => {
                assert_eq!(target.as_deref(), Some("5"));
                assert_eq!(direction, Some(SwipeDirection::Up));
                assert_eq!(distance, Some(0.6));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_invalid_json_returns_none() {
        assert!(Action::parse("not json at all").is_none());
    }

    #[test]
    fn parse_delete_defaults_count_to_one() {
        let raw = r#"{"action":"delete"}"#;
        assert_eq!(Action::parse(raw).unwrap(), Action::Delete { count: 1 });
    }

    #[test]
    fn kind_labels_match_spec_tags() {
        assert_eq!(Action::Wait.kind(), "wait");
        assert_eq!(Action::Invalid { reason: "x".into() }.kind(), "invalid");
    }

    #[test]
    fn serialize_roundtrip_click_point() {
        let action = Action::Click {
            coordinate: CoordTarget::Point([1, 2]),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }
}
