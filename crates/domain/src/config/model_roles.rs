use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::capability::ModelRole;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-agent-role model wiring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Model wiring for one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleModelConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "d_max_retry")]
    pub max_retry: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
}

impl Default for RoleModelConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            max_tokens: d_max_tokens(),
            max_retry: d_max_retry(),
            temperature: d_temperature(),
        }
    }
}

fn d_max_tokens() -> u32 {
    4096
}
fn d_max_retry() -> u32 {
    10
}
fn d_temperature() -> f32 {
    0.0
}

/// All six agent roles' model wiring, keyed by `ModelRole`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelRolesConfig {
    #[serde(default)]
    roles: HashMap<ModelRole, RoleModelConfig>,
}

impl ModelRolesConfig {
    pub fn get(&self, role: ModelRole) -> Option<&RoleModelConfig> {
        self.roles.get(&role)
    }

    pub fn insert(&mut self, role: ModelRole, cfg: RoleModelConfig) {
        self.roles.insert(role, cfg);
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
