//! Scenario-file parsing: batches of named tasks grouped under an app
//! (§6 "scenario file"), selected by id on the command line.

use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub apps: Vec<AppEntry>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AppEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioEntry {
    pub id: String,
    pub instruction: String,
}

/// Pick one scenario by id, or the first one when no id is given.
pub fn resolve_scenario<'a>(data: &'a ScenarioFile, scenario_id: Option<&str>) -> Result<&'a ScenarioEntry> {
    if data.scenarios.is_empty() {
        bail!("scenario file has no scenarios");
    }
    if let Some(id) = scenario_id {
        return data
            .scenarios
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("scenario id {id} not found"));
    }
    Ok(&data.scenarios[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioFile {
        serde_json::from_str(
            r#"{
                "apps": [{"id": "settings", "name": "Settings"}],
                "scenarios": [
                    {"id": "wifi_01", "instruction": "open wifi settings"},
                    {"id": "bt_01", "instruction": "toggle bluetooth"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_scenario_by_id() {
        let data = sample();
        let scenario = resolve_scenario(&data, Some("bt_01")).unwrap();
        assert_eq!(scenario.instruction, "toggle bluetooth");
    }

    #[test]
    fn falls_back_to_first_scenario_without_id() {
        let data = sample();
        let scenario = resolve_scenario(&data, None).unwrap();
        assert_eq!(scenario.id, "wifi_01");
    }

    #[test]
    fn unknown_scenario_id_errors() {
        let data = sample();
        assert!(resolve_scenario(&data, Some("missing")).is_err());
    }

    #[test]
    fn empty_scenarios_errors() {
        let data = ScenarioFile { apps: vec![], scenarios: vec![] };
        assert!(resolve_scenario(&data, None).is_err());
    }
}
