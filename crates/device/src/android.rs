//! Android variant of the device driver, wrapping `adb` (§4.1).

use std::path::Path;

use async_trait::async_trait;

use crate::driver::{
    encode_input_text, is_ascii_line, run_command, split_type_lines, DeviceDriver,
};

pub struct AndroidDriver {
    adb_path: String,
    device_id: Option<String>,
    print_device_cmd: bool,
    dump_retries: u32,
}

impl AndroidDriver {
    pub fn new(adb_path: impl Into<String>, device_id: Option<String>, print_device_cmd: bool) -> Self {
        Self {
            adb_path: adb_path.into(),
            device_id,
            print_device_cmd,
            dump_retries: 3,
        }
    }

    fn base(&self) -> String {
        match &self.device_id {
            Some(id) => format!("{} -s {id}", self.adb_path),
            None => self.adb_path.clone(),
        }
    }

    async fn run(&self, args: &str) -> String {
        let command = format!("{} {args}", self.base());
        run_command(&command, self.print_device_cmd).await;
        command
    }
}

#[async_trait]
impl DeviceDriver for AndroidDriver {
    async fn screenshot(&self, path: &Path) -> bool {
        self.run("shell rm /sdcard/screenshot.png").await;
        self.run("shell screencap -p /sdcard/screenshot.png").await;
        let pull = format!("pull /sdcard/screenshot.png \"{}\"", path.display());
        self.run(&pull).await;

        let xml_path = path.with_extension("xml");
        for _ in 0..self.dump_retries {
            self.run("shell rm /sdcard/window_dump.xml").await;
            self.run("shell uiautomator dump /sdcard/window_dump.xml")
                .await;
            let pull_xml = format!("pull /sdcard/window_dump.xml \"{}\"", xml_path.display());
            self.run(&pull_xml).await;
            if xml_path.exists() {
                break;
            }
        }

        path.exists()
    }

    async fn tap(&self, x: i64, y: i64) -> String {
        self.run(&format!("shell input tap {x} {y}")).await
    }

    async fn type_text(&self, text: &str) -> String {
        let lines = split_type_lines(text);
        let mut commands = Vec::new();
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            // Split into runs of ASCII (sent via `input text`) and
            // non-ASCII (sent char-by-char via an ADBKeyboard broadcast).
            let mut ascii_buf = String::new();
            for ch in line.chars() {
                if ch.is_ascii() {
                    ascii_buf.push(ch);
                } else {
                    if !ascii_buf.is_empty() {
                        commands.push(self.send_ascii_segment(&ascii_buf).await);
                        ascii_buf.clear();
                    }
                    commands.push(self.send_adbkeyboard_char(ch).await);
                }
            }
            if !ascii_buf.is_empty() {
                commands.push(self.send_ascii_segment(&ascii_buf).await);
            }
            if i != last {
                commands.push(self.run("shell input keyevent 66").await);
            }
        }
        commands.join("; ")
    }

    async fn delete(&self, count: u32) -> String {
        let mut commands = Vec::with_capacity(count as usize);
        for _ in 0..count {
            commands.push(self.run("shell input keyevent 67").await);
        }
        commands.join("; ")
    }

    async fn swipe(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String {
        self.run(&format!("shell input swipe {x1} {y1} {x2} {y2} {duration_ms}"))
            .await
    }

    async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64, _duration_ms: u64) -> String {
        // `input draganddrop` has no duration argument on stock Android;
        // the parameter is accepted for interface parity only.
        self.run(&format!("shell input draganddrop {x1} {y1} {x2} {y2}"))
            .await
    }

    async fn back(&self) -> String {
        self.run("shell input keyevent 4").await
    }

    async fn home(&self) -> String {
        self.run("shell am start -a android.intent.action.MAIN -c android.intent.category.HOME")
            .await
    }
}

impl AndroidDriver {
    async fn send_ascii_segment(&self, segment: &str) -> String {
        debug_assert!(is_ascii_line(segment));
        let encoded = encode_input_text(segment);
        self.run(&format!("shell input text '{encoded}'")).await
    }

    async fn send_adbkeyboard_char(&self, ch: char) -> String {
        self.run(&format!("shell am broadcast -a ADB_INPUT_TEXT --es msg '{ch}'"))
            .await
    }
}
