//! Action service: parse model-emitted action JSON and turn it into a
//! device command (§4.5).

use sa_device::DeviceDriver;
use sa_domain::action::{Action, CoordTarget, SwipeDirection, SystemButton};
use sa_domain::config::CoordinateConvention;
use sa_domain::coordinate::to_absolute;
use sa_domain::som::SomMap;

const MARGIN_FRACTION: f64 = 0.10;
const MIN_MARK_SWIPE_PX: f64 = 50.0;
const MIN_SCREEN_SWIPE_PX: f64 = 200.0;
const DRAG_THRESHOLD_MS: u64 = 1000;

/// Resolve a coordinate target to absolute pixels. For a mark hit,
/// returns the mark's id alongside its center so the caller can record
/// it as the last-used mark.
pub fn resolve_coordinate(
    target: &CoordTarget,
    marks: &SomMap,
    convention: CoordinateConvention,
    width: u32,
    height: u32,
) -> Option<(i64, i64, Option<String>)> {
    match target {
        CoordTarget::Mark(id) => marks
            .get(id)
            .map(|entry| (entry.center[0], entry.center[1], Some(id.clone()))),
        CoordTarget::Point([x, y]) => {
            let (ax, ay) = match convention {
                CoordinateConvention::Absolute => (*x, *y),
                CoordinateConvention::Relative1000 => to_absolute([*x, *y], width, height),
            };
            Some((ax, ay, None))
        }
    }
}

/// Outcome of executing an action: the device command string, and the
/// mark id that should become `last_used_mark` (if any).
pub struct Executed {
    pub command: Option<String>,
    pub last_used_mark: Option<String>,
}

fn ok(command: String) -> Executed {
    Executed {
        command: Some(command),
        last_used_mark: None,
    }
}

fn noop() -> Executed {
    Executed {
        command: None,
        last_used_mark: None,
    }
}

pub async fn execute(
    driver: &dyn DeviceDriver,
    action: &Action,
    marks: &SomMap,
    convention: CoordinateConvention,
    width: u32,
    height: u32,
) -> Executed {
    match action {
        Action::Answer { .. } => noop(),
        Action::Wait => {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            ok("wait".to_string())
        }
        Action::Invalid { .. } => noop(),
        Action::Click { coordinate } => {
            let Some((x, y, mark)) = resolve_coordinate(coordinate, marks, convention, width, height)
            else {
                return noop();
            };
            let command = driver.tap(x, y).await;
            Executed {
                command: Some(command),
                last_used_mark: mark,
            }
        }
        Action::Type { text } => ok(driver.type_text(text).await),
        Action::Delete { count } => ok(driver.delete(*count).await),
        Action::SystemButton { button } => match button {
            SystemButton::Back => ok(driver.back().await),
            SystemButton::Home => ok(driver.home().await),
            SystemButton::Enter => ok(driver.type_text("\n").await),
        },
        Action::Swipe {
            coordinate,
            coordinate2,
            target,
            direction,
            distance,
            duration,
        } => {
            execute_swipe(
                driver,
                marks,
                convention,
                width,
                height,
                *coordinate,
                *coordinate2,
                target.as_deref(),
                *direction,
                *distance,
                *duration,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute_swipe(
    driver: &dyn DeviceDriver,
    marks: &SomMap,
    convention: CoordinateConvention,
    width: u32,
    height: u32,
    coordinate: Option<[i64; 2]>,
    coordinate2: Option<[i64; 2]>,
    target: Option<&str>,
    direction: Option<SwipeDirection>,
    distance: Option<f64>,
    duration: Option<f64>,
) -> Executed {
    let duration_ms = (duration.unwrap_or(0.5) * 1000.0).round() as u64;

    let (x1, y1, x2, y2) = if let (Some(c1), Some(c2)) = (coordinate, coordinate2) {
        let (ax1, ay1) = resolve_point(c1, convention, width, height);
        let (ax2, ay2) = resolve_point(c2, convention, width, height);
        (ax1, ay1, ax2, ay2)
    } else if let Some(mark_id) = target {
        match mark_anchored_points(marks, mark_id, direction, distance, width, height) {
            Some(points) => points,
            None => return noop(),
        }
    } else {
        return noop();
    };

    let command = if duration_ms >= DRAG_THRESHOLD_MS {
        driver.drag(x1, y1, x2, y2, duration_ms).await
    } else {
        driver.swipe(x1, y1, x2, y2, duration_ms).await
    };
    ok(command)
}

fn resolve_point(point: [i64; 2], convention: CoordinateConvention, width: u32, height: u32) -> (i64, i64) {
    match convention {
        CoordinateConvention::Absolute => (point[0], point[1]),
        CoordinateConvention::Relative1000 => to_absolute(point, width, height),
    }
}

fn mark_anchored_points(
    marks: &SomMap,
    mark_id: &str,
    direction: Option<SwipeDirection>,
    distance: Option<f64>,
    width: u32,
    height: u32,
) -> Option<(i64, i64, i64, i64)> {
    let direction = direction?;
    let dist = distance.unwrap_or(0.5).clamp(0.1, 0.9);

    if let Some(entry) = marks.get(mark_id) {
        let w = entry.width() as f64;
        let h = entry.height() as f64;
        let margin_x = w * MARGIN_FRACTION;
        let margin_y = h * MARGIN_FRACTION;
        let cx = entry.center[0] as f64;
        let cy = entry.center[1] as f64;
        let usable = match direction {
            SwipeDirection::Up | SwipeDirection::Down => (h - 2.0 * margin_y).max(MIN_MARK_SWIPE_PX),
            SwipeDirection::Left | SwipeDirection::Right => (w - 2.0 * margin_x).max(MIN_MARK_SWIPE_PX),
        };
        let travel = (usable * dist).max(MIN_MARK_SWIPE_PX);
        let (x1, y1, x2, y2) = endpoints(cx, cy, travel, direction);
        Some((x1 as i64, y1 as i64, x2 as i64, y2 as i64))
    } else {
        let w = width as f64;
        let h = height as f64;
        let cx = w / 2.0;
        let cy = h / 2.0;
        let usable = match direction {
            SwipeDirection::Up | SwipeDirection::Down => h * 0.5,
            SwipeDirection::Left | SwipeDirection::Right => w * 0.5,
        };
        let travel = (usable * dist).max(MIN_SCREEN_SWIPE_PX);
        let (x1, y1, x2, y2) = endpoints(cx, cy, travel, direction);
        Some((x1 as i64, y1 as i64, x2 as i64, y2 as i64))
    }
}

fn endpoints(cx: f64, cy: f64, travel: f64, direction: SwipeDirection) -> (f64, f64, f64, f64) {
    let half = travel / 2.0;
    match direction {
        SwipeDirection::Up => (cx, cy + half, cx, cy - half),
        SwipeDirection::Down => (cx, cy - half, cx, cy + half),
        SwipeDirection::Left => (cx + half, cy, cx - half, cy),
        SwipeDirection::Right => (cx - half, cy, cx + half, cy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::som::{MarkEntry, NodeType};
    use std::path::Path;
    use async_trait::async_trait;

    struct RecordingDriver;

    #[async_trait]
    impl DeviceDriver for RecordingDriver {
        async fn screenshot(&self, _path: &Path) -> bool {
            true
        }
        async fn tap(&self, x: i64, y: i64) -> String {
            format!("tap {x} {y}")
        }
        async fn type_text(&self, text: &str) -> String {
            format!("type {text}")
        }
        async fn delete(&self, count: u32) -> String {
            format!("delete {count}")
        }
        async fn swipe(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String {
            format!("swipe {x1} {y1} {x2} {y2} {duration_ms}")
        }
        async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String {
            format!("drag {x1} {y1} {x2} {y2} {duration_ms}")
        }
        async fn back(&self) -> String {
            "back".to_string()
        }
        async fn home(&self) -> String {
            "home".to_string()
        }
    }

    #[tokio::test]
    async fn click_by_mark_resolves_center_and_records_it() {
        let driver = RecordingDriver;
        let mut marks = SomMap::new();
        marks.insert(
            "3".into(),
            MarkEntry {
                center: [120, 400],
                bounds: [[100, 380], [140, 420]],
                node_type: NodeType::Clickable,
            },
        );
        let action = Action::Click {
            coordinate: CoordTarget::Mark("3".into()),
        };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Relative1000, 1080, 2400).await;
        assert_eq!(result.command.as_deref(), Some("tap 120 400"));
        assert_eq!(result.last_used_mark.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn click_by_relative_point_maps_to_absolute() {
        let driver = RecordingDriver;
        let marks = SomMap::new();
        let action = Action::Click {
            coordinate: CoordTarget::Point([500, 500]),
        };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Relative1000, 1080, 2400).await;
        assert_eq!(result.command.as_deref(), Some("tap 540 1200"));
    }

    #[tokio::test]
    async fn answer_is_a_noop() {
        let driver = RecordingDriver;
        let marks = SomMap::new();
        let action = Action::Answer { text: "done".into() };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Relative1000, 1080, 2400).await;
        assert!(result.command.is_none());
    }

    #[tokio::test]
    async fn long_duration_dispatches_to_drag() {
        let driver = RecordingDriver;
        let marks = SomMap::new();
        let action = Action::Swipe {
            coordinate: Some([0, 0]),
            coordinate2: Some([0, 0]),
            target: None,
            direction: None,
            distance: None,
            duration: Some(1.5),
        };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Absolute, 1080, 2400).await;
        assert!(result.command.unwrap().starts_with("drag"));
    }

    #[tokio::test]
    async fn short_duration_dispatches_to_swipe() {
        let driver = RecordingDriver;
        let marks = SomMap::new();
        let action = Action::Swipe {
            coordinate: Some([0, 0]),
            coordinate2: Some([10, 10]),
            target: None,
            direction: None,
            distance: None,
            duration: Some(0.3),
        };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Absolute, 1080, 2400).await;
        assert!(result.command.unwrap().starts_with("swipe"));
    }

    #[tokio::test]
    async fn mark_anchored_swipe_without_bounds_falls_back_to_screen() {
        let driver = RecordingDriver;
        let marks = SomMap::new();
        let action = Action::Swipe {
            coordinate: None,
            coordinate2: None,
            target: Some("99".into()),
            direction: Some(SwipeDirection::Up),
            distance: Some(0.5),
            duration: None,
        };
        let result = execute(&driver, &action, &marks, CoordinateConvention::Absolute, 1080, 2400).await;
        assert!(result.command.unwrap().starts_with("swipe"));
    }
}
