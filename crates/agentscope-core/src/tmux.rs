//! tmux control and process-to-pane resolution.
//!
//! Launched agents get a window in a dedicated tmux session. Agents started
//! elsewhere are tied back to their tmux window by walking the process tree
//! from the vendor process up to a pane's shell. All of this is advisory:
//! when tmux is not installed, resolution just yields nothing.

use crate::config::TmuxSettings;
use crate::error::TmuxError;
use crate::layout::project_hash;
use crate::process::{CommandRunner, ProcessInspector};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// Window targets are `session:index`, the same form for windows we open
/// and windows found by walking the process tree.
const WINDOW_TARGET_FORMAT: &str = "#{session_name}:#{window_index}";

/// Thin async wrapper over the `tmux` CLI.
#[derive(Debug, Clone)]
pub struct TmuxClient {
    bin: String,
    runner: CommandRunner,
}

impl TmuxClient {
    pub fn new(bin: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            bin: bin.into(),
            runner,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        self.runner.run(&self.bin, args).await
    }

    pub async fn has_session(&self, name: &str) -> bool {
        matches!(
            self.runner.output(&self.bin, &["has-session", "-t", name]).await,
            Ok(output) if output.status.success()
        )
    }

    /// Create a detached session whose first window is `window`, returning
    /// that window's target.
    pub async fn new_session(&self, name: &str, window: &str, cwd: &Path) -> Result<String, TmuxError> {
        let cwd = cwd.to_string_lossy();
        self.run(&[
            "new-session", "-d", "-P", "-F", WINDOW_TARGET_FORMAT, "-s", name, "-n", window, "-c", &cwd,
        ])
        .await
        .map(|out| out.trim().to_string())
    }

    /// Add a window to `session`, returning its target.
    pub async fn new_window(&self, session: &str, window: &str, cwd: &Path) -> Result<String, TmuxError> {
        let cwd = cwd.to_string_lossy();
        self.run(&[
            "new-window", "-d", "-P", "-F", WINDOW_TARGET_FORMAT, "-t", session, "-n", window, "-c", &cwd,
        ])
        .await
        .map(|out| out.trim().to_string())
    }

    /// Type `text` into `target` and press Enter.
    pub async fn send_keys(&self, target: &str, text: &str) -> Result<(), TmuxError> {
        self.run(&["send-keys", "-t", target, text, "Enter"])
            .await
            .map(drop)
    }

    pub async fn kill_window(&self, target: &str) -> Result<(), TmuxError> {
        self.run(&["kill-window", "-t", target]).await.map(drop)
    }

    /// Open a window named `window` in `session` (creating the session if
    /// needed), start `command` in it, and return the window target.
    pub async fn open_window(
        &self,
        session: &str,
        window: &str,
        cwd: &Path,
        command: &str,
    ) -> Result<String, TmuxError> {
        let target = if self.has_session(session).await {
            self.new_window(session, window, cwd).await?
        } else {
            self.new_session(session, window, cwd).await?
        };
        if target.is_empty() {
            return Err(TmuxError::CommandFailed {
                program: self.bin.clone(),
                message: format!("no target reported for window {window}"),
            });
        }
        self.send_keys(&target, command).await?;
        debug!(target: "agentscope::tmux", %target, command, "Opened window");
        Ok(target)
    }

    /// Shell pid of every pane mapped to its window target.
    pub async fn pane_windows(&self) -> Result<HashMap<u32, String>, TmuxError> {
        let format = format!("#{{pane_pid}} {WINDOW_TARGET_FORMAT}");
        let stdout = self.run(&["list-panes", "-a", "-F", &format]).await?;
        Ok(parse_pane_windows(&stdout))
    }

    /// Targets of every window on the server.
    pub async fn live_windows(&self) -> Result<HashSet<String>, TmuxError> {
        let stdout = self
            .run(&["list-windows", "-a", "-F", WINDOW_TARGET_FORMAT])
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn parse_pane_windows(stdout: &str) -> HashMap<u32, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (pid, target) = line.trim().split_once(' ')?;
            let target = target.trim();
            if !target.contains(':') {
                return None;
            }
            Some((pid.parse().ok()?, target.to_string()))
        })
        .collect()
}

/// Walk from `pid` up through its ancestors until a pane's shell is found.
pub fn trace_to_pane<'a>(
    pid: u32,
    parents: &HashMap<u32, u32>,
    panes: &'a HashMap<u32, String>,
    max_depth: usize,
) -> Option<&'a str> {
    let mut current = pid;
    for _ in 0..=max_depth {
        if let Some(name) = panes.get(&current) {
            return Some(name);
        }
        match parents.get(&current) {
            Some(&parent) if parent != 0 && parent != current => current = parent,
            _ => return None,
        }
    }
    None
}

/// Finds the tmux window hosting a vendor process for a given workspace.
#[derive(Debug)]
pub struct TmuxResolver {
    tmux: TmuxClient,
    procs: ProcessInspector,
    max_depth: usize,
    unavailable_logged: AtomicBool,
}

impl TmuxResolver {
    pub fn new(settings: &TmuxSettings, runner: CommandRunner) -> Self {
        Self {
            tmux: TmuxClient::new(settings.tmux_bin.clone(), runner.clone()),
            procs: ProcessInspector::new(runner),
            max_depth: settings.ancestor_depth,
            unavailable_logged: AtomicBool::new(false),
        }
    }

    fn log_unavailable(&self, err: &TmuxError) {
        if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
            warn!(target: "agentscope::tmux", error = %err, "Terminal resolution unavailable");
        } else {
            trace!(target: "agentscope::tmux", error = %err, "Terminal resolution failed");
        }
    }

    /// tmux window target of a running `binary` whose cwd is `project_dir`.
    pub async fn resolve(&self, binary: &str, project_dir: &Path) -> Option<String> {
        let expected = project_hash(project_dir);
        let pids = match self.procs.pids_by_name(binary).await {
            Ok(pids) => pids,
            Err(e) => {
                self.log_unavailable(&e);
                return None;
            }
        };

        let mut candidates = Vec::new();
        for pid in pids {
            if let Some(cwd) = self.procs.cwd_of(pid).await {
                if project_hash(&cwd) == expected {
                    candidates.push(pid);
                }
            }
        }
        if candidates.is_empty() {
            return None;
        }

        let panes = match self.tmux.pane_windows().await {
            Ok(panes) => panes,
            Err(e) => {
                self.log_unavailable(&e);
                return None;
            }
        };
        let parents = match self.procs.parent_map().await {
            Ok(parents) => parents,
            Err(e) => {
                self.log_unavailable(&e);
                return None;
            }
        };

        let found = candidates
            .into_iter()
            .find_map(|pid| trace_to_pane(pid, &parents, &panes, self.max_depth))
            .map(str::to_string);
        trace!(target: "agentscope::tmux", binary, dir = %project_dir.display(), ?found, "Resolved terminal");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(pairs: &[(u32, u32)]) -> HashMap<u32, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_parse_pane_windows() {
        let panes = parse_pane_windows("100 work:1\n200 agentscope:3\n300 agentscope\nbad line\n");
        assert_eq!(panes.get(&100).map(String::as_str), Some("work:1"));
        assert_eq!(panes.get(&200).map(String::as_str), Some("agentscope:3"));
        assert_eq!(panes.len(), 2);
    }

    #[test]
    fn test_trace_walks_up_to_pane_shell() {
        let parents = tree(&[(500, 400), (400, 300), (300, 1)]);
        let panes = parse_pane_windows("300 work:2\n310 work:3\n");
        assert_eq!(trace_to_pane(500, &parents, &panes, 10), Some("work:2"));
    }

    #[test]
    fn test_trace_respects_depth_limit() {
        let parents = tree(&[(5, 4), (4, 3), (3, 2), (2, 1)]);
        let panes: HashMap<u32, String> = [(1, "far".to_string())].into_iter().collect();
        assert_eq!(trace_to_pane(5, &parents, &panes, 2), None);
        assert_eq!(trace_to_pane(5, &parents, &panes, 4), Some("far"));
    }

    #[test]
    fn test_trace_stops_at_unrelated_root() {
        let parents = tree(&[(500, 1), (1, 0)]);
        let panes: HashMap<u32, String> = [(300, "work".to_string())].into_iter().collect();
        assert_eq!(trace_to_pane(500, &parents, &panes, 10), None);
    }

    #[tokio::test]
    async fn test_missing_tmux_resolves_to_none() {
        let settings = TmuxSettings {
            tmux_bin: "agentscope-missing-tmux".into(),
            ..TmuxSettings::default()
        };
        let resolver = TmuxResolver::new(&settings, CommandRunner::new(std::time::Duration::from_secs(2)));
        let client = TmuxClient::new("agentscope-missing-tmux", CommandRunner::new(std::time::Duration::from_secs(2)));
        assert!(client.pane_windows().await.is_err());
        assert!(client.live_windows().await.is_err());
        assert!(!client.has_session("anything").await);
        assert_eq!(
            resolver.resolve("agentscope-no-such-agent", Path::new("/repo")).await,
            None
        );
    }
}
