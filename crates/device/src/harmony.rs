//! HarmonyOS variant of the device driver, wrapping `hdc` (§4.1).

use std::path::Path;

use async_trait::async_trait;

use crate::driver::{run_command, split_type_lines, DeviceDriver};

pub struct HarmonyDriver {
    hdc_path: String,
    print_device_cmd: bool,
    dump_retries: u32,
}

impl HarmonyDriver {
    pub fn new(hdc_path: impl Into<String>, print_device_cmd: bool) -> Self {
        Self {
            hdc_path: hdc_path.into(),
            print_device_cmd,
            dump_retries: 3,
        }
    }

    async fn run(&self, args: &str) -> String {
        let command = format!("{} {args}", self.hdc_path);
        run_command(&command, self.print_device_cmd).await;
        command
    }
}

#[async_trait]
impl DeviceDriver for HarmonyDriver {
    async fn screenshot(&self, path: &Path) -> bool {
        self.run("shell rm /data/local/tmp/screenshot.png").await;
        self.run("shell uitest screenCap -p /data/local/tmp/screenshot.png")
            .await;
        let recv = format!(
            "file recv /data/local/tmp/screenshot.png \"{}\"",
            path.display()
        );
        self.run(&recv).await;

        let xml_path = path.with_extension("xml");
        for _ in 0..self.dump_retries {
            self.run("shell rm /data/local/tmp/layout.xml").await;
            self.run("shell uitest dumpLayout").await;
            let pull_xml = format!(
                "file recv /data/local/tmp/layout.xml \"{}\"",
                xml_path.display()
            );
            self.run(&pull_xml).await;
            if xml_path.exists() {
                break;
            }
        }

        path.exists()
    }

    async fn tap(&self, x: i64, y: i64) -> String {
        self.run(&format!("shell uitest uiInput click {x} {y}")).await
    }

    async fn type_text(&self, text: &str) -> String {
        let lines = split_type_lines(text);
        let mut commands = Vec::new();
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            for ch in line.chars() {
                commands.push(self.send_char(ch).await);
            }
            if i != last {
                commands.push(self.run("shell uitest uiInput keyEvent Enter").await);
            }
        }
        commands.join("; ")
    }

    async fn delete(&self, count: u32) -> String {
        let mut commands = Vec::with_capacity(count as usize);
        for _ in 0..count {
            commands.push(self.run("shell uitest uiInput keyEvent Delete").await);
        }
        commands.join("; ")
    }

    async fn swipe(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String {
        self.run(&format!(
            "shell uitest uiInput swipe {x1} {y1} {x2} {y2} {duration_ms}"
        ))
        .await
    }

    async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String {
        // HarmonyOS has no independent drag primitive; reuse swipe with
        // the slower duration (§4.1 "otherwise reuse swipe with a >=1s
        // duration").
        self.swipe(x1, y1, x2, y2, duration_ms.max(1000)).await
    }

    async fn back(&self) -> String {
        self.run("shell uitest uiInput keyEvent Back").await
    }

    async fn home(&self) -> String {
        self.run("shell uitest uiInput keyEvent Home").await
    }
}

impl HarmonyDriver {
    async fn send_char(&self, ch: char) -> String {
        if ch == ' ' {
            return self.run("shell uitest uiInput keyEvent 2050").await;
        }
        self.run(&format!("shell uitest uiInput inputText 1 1 \"{ch}\""))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tap_returns_command_string() {
        let driver = HarmonyDriver::new("echo", false);
        let cmd = driver.tap(5, 6).await;
        assert!(cmd.contains("uiInput click 5 6"));
    }

    #[tokio::test]
    async fn drag_reuses_swipe_with_minimum_duration() {
        let driver = HarmonyDriver::new("echo", false);
        let cmd = driver.drag(1, 2, 3, 4, 200).await;
        assert!(cmd.contains("swipe 1 2 3 4 1000"));
    }

    #[tokio::test]
    async fn screenshot_returns_false_without_real_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let driver = HarmonyDriver::new("echo", false);
        assert!(!driver.screenshot(&path).await);
    }
}
