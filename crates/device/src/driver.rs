//! Device driver contract (§4.1).
//!
//! Implementations wrap a per-platform subprocess binary (`adb`/`hdc`).
//! Every operation returns the exact command string it executed, for
//! script/chat logging — subprocess failures are absorbed (never
//! propagated as `Err`); the screenshot path is the only hard failure.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Capture a screenshot + sibling UI-hierarchy XML dump at
    /// `<path>.xml`. Returns true iff the image file exists afterward.
    async fn screenshot(&self, path: &Path) -> bool;

    async fn tap(&self, x: i64, y: i64) -> String;

    /// Normalizes line endings, splits by `\n`, sends each line via
    /// `input text` (ASCII) or a broadcast keyboard (non-ASCII), and an
    /// ENTER keypress between lines (§4.1).
    async fn type_text(&self, text: &str) -> String;

    async fn delete(&self, count: u32) -> String;

    async fn swipe(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String;

    /// Distinguishable from `swipe` where the platform supports it;
    /// otherwise the implementation reuses `swipe` with a >=1s duration.
    async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64, duration_ms: u64) -> String;

    async fn back(&self) -> String;

    async fn home(&self) -> String;
}

/// Run a shell command, optionally echoing it and its output
/// line-prefixed (§4.1 "optional command-echoing"). Never panics on a
/// nonzero exit or missing binary — the caller only cares about the
/// command string that was attempted.
pub(crate) async fn run_command(command: &str, echo: bool) -> Output {
    if echo {
        println!("[DEV] {command}");
    }
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(command, error = %e, "device subprocess failed to spawn");
            Output {
                status: Default::default(),
                stdout: Vec::new(),
                stderr: e.to_string().into_bytes(),
            }
        });

    if echo {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines() {
            println!("{line}");
        }
        for line in stderr.lines() {
            eprintln!("{line}");
        }
    }
    output
}

/// Normalize `\r\n`, `\r`, and the literal two-character sequence `\\n`
/// to `\n`, then split into lines (§4.1 `type` semantics).
pub(crate) fn split_type_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace("\\n", "\n")
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Encode a line for ADB/HDC's `input text`: spaces become the literal
/// token `%s` (not URL percent-encoding — this is the shell-level
/// convention both `adb shell input text` and `hdc shell uitest`
/// expect).
pub(crate) fn encode_input_text(line: &str) -> String {
    line.replace(' ', "%s")
}

pub(crate) fn is_ascii_line(line: &str) -> bool {
    line.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_type_lines_normalizes_all_line_ending_styles() {
        assert_eq!(split_type_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_type_lines("a\rb"), vec!["a", "b"]);
        assert_eq!(split_type_lines("a\\nb"), vec!["a", "b"]);
    }

    #[test]
    fn encode_input_text_replaces_spaces_with_percent_s() {
        assert_eq!(encode_input_text("hello world"), "hello%sworld");
    }

    #[test]
    fn ascii_detection() {
        assert!(is_ascii_line("hello"));
        assert!(!is_ascii_line("你好"));
    }

    #[tokio::test]
    async fn run_command_survives_nonexistent_binary() {
        let output = run_command("definitely-not-a-real-binary-xyz", false).await;
        assert!(!output.status.success());
    }
}
