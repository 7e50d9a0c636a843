/*!
 * Launch Types
 * Configuration and results for process launches
 */

use crate::core::types::Pid;
use serde::{Deserialize, Serialize};

/// Captured output and exit status of a synchronously-launched child.
///
/// Owned solely by the caller; populated once the child is fully drained
/// and waited on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ProcessOutput {
    /// Captured stdout as lossy UTF-8
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Captured stderr as lossy UTF-8
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Result of a successful launch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LaunchOutcome {
    pub pid: Pid,
    /// Present only when the launch captured output (and therefore waited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ProcessOutput>,
}

/// Configuration for one launch
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub app: String,
    /// Empty means "default to the resolved application's directory"
    pub working_dir: String,
    pub command_line: String,
    pub pause_at_main: bool,
    pub capture_output: bool,
}

impl LaunchConfig {
    #[inline]
    #[must_use]
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            working_dir: String::new(),
            command_line: String::new(),
            pause_at_main: false,
            capture_output: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_pause_at_main(mut self, pause: bool) -> Self {
        self.pause_at_main = pause;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_output_capture(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }
}
