mod device;
mod job_service;
mod llm;
mod model_roles;
mod orchestrator;
mod perception;

pub use device::*;
pub use job_service::*;
pub use llm::*;
pub use model_roles::*;
pub use orchestrator::*;
pub use perception::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    /// Provider credentials/base URLs (`provider id -> base_url/auth`).
    /// `model_roles` wires each agent role to one of these provider ids.
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub model_roles: ModelRolesConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub job_service: JobServiceConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, admin endpoints are **disabled** (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "SA_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        // Job service must bind to a non-empty address.
        if self.job_service.bind_addr.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "job_service.bind_addr".into(),
                message: "bind_addr must not be empty".into(),
            });
        }

        // Device pool empty is an error: no worker can ever start.
        if self.job_service.device_pool.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "job_service.device_pool".into(),
                message: "device_pool must list at least one device id".into(),
            });
        }

        // Duplicate device ids would double-assign a worker to one device.
        {
            let mut seen = std::collections::HashSet::new();
            for (i, id) in self.job_service.device_pool.iter().enumerate() {
                if !seen.insert(id.as_str()) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("job_service.device_pool[{i}]"),
                        message: format!("duplicate device id \"{id}\""),
                    });
                }
            }
        }

        if self.job_service.run_root.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "job_service.run_root".into(),
                message: "run_root must not be empty".into(),
            });
        }

        // Warn when admin endpoints would be wide open on a non-loopback bind.
        let non_loopback = !self.job_service.bind_addr.starts_with("127.0.0.1")
            && !self.job_service.bind_addr.starts_with("localhost");
        if non_loopback && std::env::var(&self.admin.token_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "admin.token_env".into(),
                message: format!(
                    "job_service binds to {} but {} is unset — admin endpoints disabled",
                    self.job_service.bind_addr, self.admin.token_env
                ),
            });
        }

        // Perception: stagnation threshold must be a similarity ratio.
        if !(0.0..=1.0).contains(&self.perception.stagnation_threshold) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "perception.stagnation_threshold".into(),
                message: format!(
                    "stagnation_threshold must be within [0,1] (got {})",
                    self.perception.stagnation_threshold
                ),
            });
        }

        // Orchestrator: step budget and thresholds must be non-zero.
        if self.orchestrator.max_steps == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.max_steps".into(),
                message: "max_steps must be greater than 0".into(),
            });
        }
        if self.orchestrator.replan_threshold_k == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.replan_threshold_k".into(),
                message: "replan_threshold_k must be greater than 0".into(),
            });
        }

        // Device: retries/backoff must be usable.
        if self.device.screenshot_retries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "device.screenshot_retries".into(),
                message: "screenshot_retries must be greater than 0".into(),
            });
        }

        // Warn when no model is wired for a role the orchestrator will invoke.
        if self.model_roles.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "model_roles".into(),
                message: "no model roles configured — planner/executor/reflector calls will fail"
                    .into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
