//! Screenshot service: retry loop over the device driver, with optional
//! mark-overlay hand-off for mark-indexed perception (§4.3).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sa_device::DeviceDriver;
use sa_domain::config::{DeviceConfig, PerceptionConfig, PerceptionMode};
use sa_domain::som::SomMap;

use crate::{hierarchy, mark_engine, overlay};

/// Capture a screenshot (+ UI-hierarchy dump) named `frame_name` under
/// `out_dir`, retrying per `device.screenshot_retries`. In mark-indexed
/// mode the raw capture is forwarded to the mark engine and a
/// `*_marked.png` + `*_mapping.json` pair is produced under
/// `out_dir/marked/`; the marked path is returned instead of the raw
/// one. Returns `None` on total failure — the orchestrator treats that
/// as a fatal step.
pub async fn capture(
    driver: &dyn DeviceDriver,
    device: &DeviceConfig,
    perception: &PerceptionConfig,
    out_dir: &Path,
    frame_name: &str,
) -> Option<PathBuf> {
    let raw_path = out_dir.join(format!("{frame_name}.png"));
    let mut captured = false;

    for attempt in 0..device.screenshot_retries.max(1) {
        if driver.screenshot(&raw_path).await && raw_path.exists() {
            captured = true;
            break;
        }
        if attempt + 1 < device.screenshot_retries {
            tokio::time::sleep(Duration::from_secs(device.screenshot_backoff_secs)).await;
        }
    }

    if !captured {
        tracing::warn!(frame_name, "screenshot capture exhausted all retries");
        return None;
    }

    match perception.mode {
        PerceptionMode::DirectCoord => Some(raw_path),
        PerceptionMode::MarkIndexed => {
            mark(&raw_path, perception, out_dir, frame_name).or(Some(raw_path))
        }
    }
}

fn mark(
    raw_path: &Path,
    perception: &PerceptionConfig,
    out_dir: &Path,
    frame_name: &str,
) -> Option<PathBuf> {
    let xml_path = raw_path.with_extension("xml");
    let xml = fs::read_to_string(&xml_path).ok()?;
    let roots = hierarchy::parse(&xml);

    let mut image = image::open(raw_path).ok()?.to_rgba8();
    let (width, height) = (image.width(), image.height());

    let marks = mark_engine::select_marks(
        &roots,
        perception.target_package.as_deref(),
        width,
        height,
    );
    let font = overlay::resolve_font();
    overlay::render(&mut image, &marks, font.as_ref());

    let marked_dir = out_dir.join("marked");
    fs::create_dir_all(&marked_dir).ok()?;
    let marked_path = marked_dir.join(format!("{frame_name}_marked.png"));
    image.save(&marked_path).ok()?;
    write_mapping(&marked_dir, frame_name, &marks)?;

    Some(marked_path)
}

fn write_mapping(marked_dir: &Path, frame_name: &str, marks: &SomMap) -> Option<()> {
    let mapping_path = marked_dir.join(format!("{frame_name}_mapping.json"));
    let json = serde_json::to_string_pretty(marks).ok()?;
    fs::write(mapping_path, json).ok()
}
