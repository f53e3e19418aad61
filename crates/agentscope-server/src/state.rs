//! Shared application state.

use crate::config::Config;
use agentscope_core::{Monitor, MonitorHandle};
use tokio::task::JoinHandle;

pub struct AppState {
    pub monitor: MonitorHandle,
    pub config: Config,
}

impl AppState {
    /// Spawn the monitor and start scanning every configured workspace.
    pub fn start(config: Config) -> agentscope_core::Result<(Self, JoinHandle<()>)> {
        let (monitor, task) = Monitor::new(config.monitor.clone()).spawn();
        for entry in &config.watch {
            tracing::info!(
                target: "agentscope::startup",
                vendor = %entry.vendor,
                project_dir = %entry.project_dir.display(),
                "Watching workspace"
            );
            monitor.watch(entry.vendor, entry.project_dir.clone())?;
        }
        Ok((Self { monitor, config }, task))
    }
}
