//! Monitor configuration: delays, vendor directories and tmux settings.
//!
//! Every delay the heuristics depend on lives here as milliseconds so the
//! exact timing feel can be tuned from the server's TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for a [`crate::Monitor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub paths: VendorPaths,
    #[serde(default)]
    pub tmux: TmuxSettings,
}

/// Fixed delays used by the tailer, scanner and timer heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    /// Delay before `tool-done` is emitted so the UI doesn't flicker.
    #[serde(default = "default_tool_done_delay_ms")]
    pub tool_done_delay_ms: u64,
    /// Grace period after assistant prose with no tool call.
    #[serde(default = "default_text_idle_delay_ms")]
    pub text_idle_delay_ms: u64,
    /// Grace period after an explicit turn-end record.
    #[serde(default = "default_turn_end_delay_ms")]
    pub turn_end_delay_ms: u64,
    /// Permission-stall delay for ordinary tools.
    #[serde(default = "default_permission_delay_ms")]
    pub permission_delay_ms: u64,
    /// Permission-stall delay for shell/exec tools, which legitimately run longer.
    #[serde(default = "default_shell_permission_delay_ms")]
    pub shell_permission_delay_ms: u64,
    /// Interval of the stat-based poll watcher. `0` disables it.
    #[serde(default = "default_file_poll_interval_ms")]
    pub file_poll_interval_ms: u64,
    /// Interval of the last-resort manual read poll. `0` disables it.
    #[serde(default = "default_manual_poll_interval_ms")]
    pub manual_poll_interval_ms: u64,
    /// Project directory scan cadence. `0` disables it.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// External session scan cadence. `0` disables the ticker.
    #[serde(default = "default_external_scan_interval_ms")]
    pub external_scan_interval_ms: u64,
    /// A transcript modified within this window counts as active.
    #[serde(default = "default_external_active_window_ms")]
    pub external_active_window_ms: u64,
    /// External sessions idle for this long are pruned.
    #[serde(default = "default_stale_session_timeout_ms")]
    pub stale_session_timeout_ms: u64,
    /// Tolerated clock skew between launch time and file creation.
    #[serde(default = "default_launch_skew_ms")]
    pub launch_skew_ms: u64,
    /// Upper bound for every OS subprocess call.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_tool_done_delay_ms() -> u64 {
    300
}

fn default_text_idle_delay_ms() -> u64 {
    5_000
}

fn default_turn_end_delay_ms() -> u64 {
    1_000
}

fn default_permission_delay_ms() -> u64 {
    7_000
}

fn default_shell_permission_delay_ms() -> u64 {
    15_000
}

fn default_file_poll_interval_ms() -> u64 {
    1_000
}

fn default_manual_poll_interval_ms() -> u64 {
    2_000
}

fn default_scan_interval_ms() -> u64 {
    1_000
}

fn default_external_scan_interval_ms() -> u64 {
    5_000
}

fn default_external_active_window_ms() -> u64 {
    60_000
}

fn default_stale_session_timeout_ms() -> u64 {
    300_000
}

fn default_launch_skew_ms() -> u64 {
    5_000
}

fn default_command_timeout_ms() -> u64 {
    2_000
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tool_done_delay_ms: default_tool_done_delay_ms(),
            text_idle_delay_ms: default_text_idle_delay_ms(),
            turn_end_delay_ms: default_turn_end_delay_ms(),
            permission_delay_ms: default_permission_delay_ms(),
            shell_permission_delay_ms: default_shell_permission_delay_ms(),
            file_poll_interval_ms: default_file_poll_interval_ms(),
            manual_poll_interval_ms: default_manual_poll_interval_ms(),
            scan_interval_ms: default_scan_interval_ms(),
            external_scan_interval_ms: default_external_scan_interval_ms(),
            external_active_window_ms: default_external_active_window_ms(),
            stale_session_timeout_ms: default_stale_session_timeout_ms(),
            launch_skew_ms: default_launch_skew_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

/// A ticking interval, or `None` when configured as `0`.
fn period(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Timing {
    pub fn tool_done_delay(&self) -> Duration {
        Duration::from_millis(self.tool_done_delay_ms)
    }

    pub fn text_idle_delay(&self) -> Duration {
        Duration::from_millis(self.text_idle_delay_ms)
    }

    pub fn turn_end_delay(&self) -> Duration {
        Duration::from_millis(self.turn_end_delay_ms)
    }

    pub fn permission_delay(&self, shell: bool) -> Duration {
        if shell {
            Duration::from_millis(self.shell_permission_delay_ms)
        } else {
            Duration::from_millis(self.permission_delay_ms)
        }
    }

    pub fn file_poll_interval(&self) -> Option<Duration> {
        period(self.file_poll_interval_ms)
    }

    pub fn manual_poll_interval(&self) -> Option<Duration> {
        period(self.manual_poll_interval_ms)
    }

    pub fn scan_interval(&self) -> Option<Duration> {
        period(self.scan_interval_ms)
    }

    pub fn external_scan_interval(&self) -> Option<Duration> {
        period(self.external_scan_interval_ms)
    }

    pub fn external_active_window(&self) -> Duration {
        Duration::from_millis(self.external_active_window_ms)
    }

    pub fn stale_session_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_session_timeout_ms)
    }

    pub fn launch_skew(&self) -> Duration {
        Duration::from_millis(self.launch_skew_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Where each vendor keeps its transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPaths {
    /// `~/.claude/projects`, one hashed directory per workspace.
    #[serde(default = "default_claude_projects")]
    pub claude_projects: PathBuf,
    /// `~/.codex/sessions`, date-bucketed `YYYY/MM/DD/rollout-*.jsonl`.
    #[serde(default = "default_codex_sessions")]
    pub codex_sessions: PathBuf,
    /// Opencode transcripts, one hashed directory per workspace.
    #[serde(default = "default_opencode_transcripts")]
    pub opencode_transcripts: PathBuf,
    /// Native structured logs, one hashed directory per workspace.
    #[serde(default = "default_native_logs")]
    pub native_logs: PathBuf,
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_claude_projects() -> PathBuf {
    home().join(".claude").join("projects")
}

fn default_codex_sessions() -> PathBuf {
    std::env::var("CODEX_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".codex"))
        .join("sessions")
}

fn default_opencode_transcripts() -> PathBuf {
    std::env::var("OPENCODE_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".local").join("share").join("opencode"))
        .join("transcripts")
}

fn default_native_logs() -> PathBuf {
    home().join(".agentscope").join("logs")
}

impl Default for VendorPaths {
    fn default() -> Self {
        Self {
            claude_projects: default_claude_projects(),
            codex_sessions: default_codex_sessions(),
            opencode_transcripts: default_opencode_transcripts(),
            native_logs: default_native_logs(),
        }
    }
}

/// Terminal multiplexer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmuxSettings {
    #[serde(default = "default_tmux_bin")]
    pub tmux_bin: String,
    /// tmux session that launched agents get windows in.
    #[serde(default = "default_tmux_session")]
    pub session_name: String,
    /// Maximum parent hops when tracing a process to a tmux pane.
    #[serde(default = "default_ancestor_depth")]
    pub ancestor_depth: usize,
}

fn default_tmux_bin() -> String {
    "tmux".to_string()
}

fn default_tmux_session() -> String {
    "agentscope".to_string()
}

fn default_ancestor_depth() -> usize {
    10
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            tmux_bin: default_tmux_bin(),
            session_name: default_tmux_session(),
            ancestor_depth: default_ancestor_depth(),
        }
    }
}
