use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP job service configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobServiceConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
    /// Device ids making up the fixed pool. One worker runs per entry.
    #[serde(default)]
    pub device_pool: Vec<String>,
    #[serde(default = "d_run_root")]
    pub run_root: String,
    /// Environment variable holding the admin bearer token used by
    /// `/config`, `/upload`. Mirrors `AdminConfig::token_env`.
    #[serde(default = "d_admin_token_env")]
    pub admin_token_env: String,
    #[serde(default = "d_upload_max_bytes")]
    pub upload_max_bytes: u64,
    #[serde(default = "d_stop_grace_period_secs")]
    pub stop_grace_period_secs: u64,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
            device_pool: Vec::new(),
            run_root: d_run_root(),
            admin_token_env: d_admin_token_env(),
            upload_max_bytes: d_upload_max_bytes(),
            stop_grace_period_secs: d_stop_grace_period_secs(),
        }
    }
}

fn d_bind_addr() -> String {
    "127.0.0.1:8900".into()
}
fn d_run_root() -> String {
    "./runs".into()
}
fn d_admin_token_env() -> String {
    "SA_ADMIN_TOKEN".into()
}
fn d_upload_max_bytes() -> u64 {
    200 * 1024 * 1024
}
fn d_stop_grace_period_secs() -> u64 {
    5
}
