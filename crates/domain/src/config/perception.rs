use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Perception mode / coordinate convention / stagnation detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionMode {
    DirectCoord,
    MarkIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateConvention {
    Absolute,
    /// Model-relative, 0-1000 normalized per axis.
    Relative1000,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "d_mode")]
    pub mode: PerceptionMode,
    #[serde(default = "d_convention")]
    pub coordinate_convention: CoordinateConvention,
    #[serde(default = "d_true")]
    pub stagnation_enabled: bool,
    #[serde(default = "d_stagnation_threshold")]
    pub stagnation_threshold: f64,
    /// Optional Android/HarmonyOS package name used to filter the UI
    /// hierarchy before mark candidates are selected.
    #[serde(default)]
    pub target_package: Option<String>,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            mode: d_mode(),
            coordinate_convention: d_convention(),
            stagnation_enabled: true,
            stagnation_threshold: d_stagnation_threshold(),
            target_package: None,
        }
    }
}

fn d_mode() -> PerceptionMode {
    PerceptionMode::DirectCoord
}
fn d_convention() -> CoordinateConvention {
    CoordinateConvention::Relative1000
}
fn d_true() -> bool {
    true
}
fn d_stagnation_threshold() -> f64 {
    0.9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_direct_coord() {
        assert_eq!(PerceptionConfig::default().mode, PerceptionMode::DirectCoord);
    }

    #[test]
    fn default_threshold_is_point_nine() {
        assert!((PerceptionConfig::default().stagnation_threshold - 0.9).abs() < 1e-9);
    }
}
