//! Server configuration.

use agentscope_core::MonitorConfig;
use agentscope_types::Vendor;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Workspaces scanned from startup.
    #[serde(default)]
    pub watch: Vec<WatchEntry>,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// One (vendor, workspace) pair to scan for transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchEntry {
    pub vendor: Vendor,
    pub project_dir: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            watch: Vec::new(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Load config from `config/default.toml` or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, 8765);
        assert!(config.watch.is_empty());
        assert_eq!(config.monitor.timing.tool_done_delay_ms, 300);
    }

    #[test]
    fn test_watch_list_and_timing_overrides() {
        let config: Config = toml::from_str(
            r#"
            port = 9000

            [[watch]]
            vendor = "codex"
            project_dir = "/repo/a"

            [monitor.timing]
            permission_delay_ms = 3000

            [monitor.tmux]
            session_name = "agents"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(
            config.watch,
            vec![WatchEntry {
                vendor: Vendor::Codex,
                project_dir: PathBuf::from("/repo/a"),
            }]
        );
        assert_eq!(config.monitor.timing.permission_delay_ms, 3000);
        assert_eq!(config.monitor.timing.turn_end_delay_ms, 1000);
        assert_eq!(config.monitor.tmux.session_name, "agents");
    }

    #[test]
    fn test_load_from_reports_bad_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/default.toml");
        let config = Config::load_from(&path).unwrap();
        let defaults = Config::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(
            config.monitor.timing.shell_permission_delay_ms,
            defaults.monitor.timing.shell_permission_delay_ms
        );
        assert_eq!(config.monitor.tmux.session_name, "agentscope");
    }
}
