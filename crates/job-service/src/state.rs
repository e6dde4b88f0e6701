//! Shared application state (§4.10), grouped by concern the way this
//! codebase's `AppState` does.

use std::sync::Arc;

use sa_domain::config::JobServiceConfig;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::jobs::{JobStore, UserActiveMap};
use crate::pool::DevicePool;
use crate::spawn::ProcessTable;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<JobServiceConfig>,
    pub agent_binary: Arc<String>,
    pub agent_config_path: Arc<Option<String>>,

    // ── Job bookkeeping ──
    pub jobs: Arc<JobStore>,
    pub users: Arc<UserActiveMap>,

    // ── Device / process resources ──
    pub devices: Arc<DevicePool>,
    pub processes: Arc<ProcessTable>,

    // ── Queue ──
    pub queue_tx: mpsc::Sender<Uuid>,
}
