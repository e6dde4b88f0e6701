use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device driver configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    Android,
    HarmonyOs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "d_platform")]
    pub platform: DevicePlatform,
    /// Path to the `adb` (or `hdc`) binary. Defaults to resolving via `$PATH`.
    #[serde(default = "d_adb_path")]
    pub adb_path: String,
    /// Device serial, or `ip:port` for wireless ADB / network HDC.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Echo the exact device command (and its stdout/stderr) to the run log.
    #[serde(default)]
    pub print_device_cmd: bool,
    #[serde(default = "d_screenshot_retries")]
    pub screenshot_retries: u32,
    #[serde(default = "d_screenshot_backoff_secs")]
    pub screenshot_backoff_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            platform: d_platform(),
            adb_path: d_adb_path(),
            device_id: None,
            print_device_cmd: false,
            screenshot_retries: d_screenshot_retries(),
            screenshot_backoff_secs: d_screenshot_backoff_secs(),
        }
    }
}

impl DeviceConfig {
    /// Whether `device_id` looks like a network target (`ip:port` or
    /// bare `ip`), which needs an explicit `connect` before use.
    pub fn is_network_device(&self) -> bool {
        self.device_id
            .as_deref()
            .map(|id| id.contains(':') || id.contains('.'))
            .unwrap_or(false)
    }
}

fn d_platform() -> DevicePlatform {
    DevicePlatform::Android
}
fn d_adb_path() -> String {
    "adb".into()
}
fn d_screenshot_retries() -> u32 {
    5
}
fn d_screenshot_backoff_secs() -> u64 {
    6
}
