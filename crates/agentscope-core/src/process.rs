//! OS process introspection through short-lived subprocesses.
//!
//! Every call is bounded by a timeout and killed if it overruns; the
//! monitor task must never hang on a stuck `lsof`.

use crate::error::TmuxError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

/// Runs external commands with a fixed timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `program` and return its raw output, whatever the exit status.
    pub async fn output(&self, program: &str, args: &[&str]) -> Result<Output, TmuxError> {
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        trace!(target: "agentscope::process", program, ?args, "Running command");

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                Err(TmuxError::NotFound(program.to_string()))
            }
            Ok(Err(e)) => Err(TmuxError::Io(e)),
            Err(_) => Err(TmuxError::Timeout(program.to_string())),
        }
    }

    /// Run `program` and return stdout, failing on a non-zero exit.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.output(program, args).await?;
        if !output.status.success() {
            return Err(TmuxError::CommandFailed {
                program: program.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `pgrep`/`lsof`/`ps` queries.
#[derive(Debug, Clone)]
pub struct ProcessInspector {
    runner: CommandRunner,
}

impl ProcessInspector {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Pids whose process name is exactly `name`.
    pub async fn pids_by_name(&self, name: &str) -> Result<Vec<u32>, TmuxError> {
        let output = self.runner.output("pgrep", &["-x", name]).await?;
        // pgrep exits 1 when nothing matched.
        if !output.status.success() && output.status.code() != Some(1) {
            return Err(TmuxError::CommandFailed {
                program: "pgrep".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_pids(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Working directory of `pid`, via `lsof` with a `/proc` fallback.
    pub async fn cwd_of(&self, pid: u32) -> Option<PathBuf> {
        let pid_arg = pid.to_string();
        match self
            .runner
            .run("lsof", &["-a", "-p", &pid_arg, "-d", "cwd", "-Fn"])
            .await
        {
            Ok(stdout) => {
                if let Some(cwd) = parse_lsof_cwd(&stdout) {
                    return Some(cwd);
                }
            }
            Err(e) => trace!(target: "agentscope::process", pid, error = %e, "lsof failed"),
        }
        std::fs::read_link(format!("/proc/{pid}/cwd")).ok()
    }

    /// Parent pid of every running process.
    pub async fn parent_map(&self) -> Result<HashMap<u32, u32>, TmuxError> {
        let stdout = self.runner.run("ps", &["-A", "-o", "pid=,ppid="]).await?;
        Ok(parse_parent_map(&stdout))
    }
}

fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

/// `lsof -Fn` prints `p<pid>`, `f<fd>` and `n<name>` lines.
fn parse_lsof_cwd(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix('n'))
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

fn parse_parent_map(stdout: &str) -> HashMap<u32, u32> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            Some((pid, ppid))
        })
        .collect()
}
