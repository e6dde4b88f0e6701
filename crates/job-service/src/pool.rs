//! Device pool (§4.10, §5): a blocking queue of device ids. `acquire()`
//! suspends until a device is free; before handing it out, a bounded
//! `ensure_connected` pre-flight reconnects network devices.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

const ENSURE_CONNECTED_TIMEOUT: Duration = Duration::from_secs(5);

/// A device handed out by the pool. Dropping it without calling
/// [`DevicePool::release`] leaks the slot for the lifetime of the pool —
/// callers must release explicitly once the job finishes.
pub struct DevicePool {
    adb_path: String,
    tx: mpsc::Sender<String>,
    rx: AsyncMutex<mpsc::Receiver<String>>,
    size: usize,
}

impl DevicePool {
    pub fn new(device_ids: Vec<String>, adb_path: impl Into<String>) -> Self {
        let size = device_ids.len();
        let (tx, rx) = mpsc::channel(size.max(1));
        for id in &device_ids {
            tx.try_send(id.clone()).expect("channel sized to device_pool length");
        }
        Self {
            adb_path: adb_path.into(),
            tx,
            rx: AsyncMutex::new(rx),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Block until a device id is available, run its connectivity
    /// pre-flight, and return it. The pre-flight failing does not block
    /// the acquire — a dead device still gets handed to the worker,
    /// which will surface the failure through its own subprocess run.
    pub async fn acquire(&self) -> String {
        let id = {
            let mut rx = self.rx.lock().await;
            rx.recv().await.expect("sender kept alive by self.tx")
        };
        ensure_connected(&self.adb_path, &id).await;
        id
    }

    /// Return a device id to the pool.
    pub async fn release(&self, device_id: String) {
        let _ = self.tx.send(device_id).await;
    }
}

/// For ids containing `:` (network targets), attempt `adb connect`;
/// otherwise probe `get-state`. Best-effort: never treated as fatal.
async fn ensure_connected(adb_path: &str, device_id: &str) {
    let args: Vec<String> = if device_id.contains(':') {
        vec!["connect".to_string(), device_id.to_string()]
    } else {
        vec!["-s".to_string(), device_id.to_string(), "get-state".to_string()]
    };

    let run = tokio::process::Command::new(adb_path).args(&args).output();
    match tokio::time::timeout(ENSURE_CONNECTED_TIMEOUT, run).await {
        Ok(Ok(output)) if !output.status.success() => {
            tracing::warn!(device_id, "ensure_connected pre-flight returned nonzero status");
        }
        Ok(Err(e)) => {
            tracing::warn!(device_id, error = %e, "ensure_connected pre-flight failed to spawn");
        }
        Err(_) => {
            tracing::warn!(device_id, "ensure_connected pre-flight timed out");
        }
        Ok(Ok(_)) => {}
    }
}
