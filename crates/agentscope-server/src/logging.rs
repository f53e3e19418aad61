//! Logging configuration and initialization.
//!
//! Presets (production, verbose, debug, trace, quiet) pick levels per
//! `agentscope::*` target; `--log target=level` overrides refine them and
//! `RUST_LOG`, when set, replaces both.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const TARGET_PREFIX: &str = "agentscope::";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Lifecycle events only; per-line parser and timer chatter is off.
    #[default]
    Production,
    Verbose,
    Debug,
    /// Everything, including every tailed line and timer.
    Trace,
    /// Warnings and errors only.
    Quiet,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides, keyed by full target name.
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        // "tailer=trace" or "agentscope::tailer=trace", comma separated.
        let mut overrides = HashMap::new();
        for override_str in log_overrides {
            for part in override_str.split(',') {
                let Some((target, level_str)) = part.split_once('=') else {
                    continue;
                };
                let target = target.trim();
                let full_target = if target.starts_with(TARGET_PREFIX) || target == "tower_http" {
                    target.to_string()
                } else {
                    format!("{TARGET_PREFIX}{target}")
                };
                if let Ok(level) = parse_level(level_str.trim()) {
                    overrides.insert(full_target, level);
                }
            }
        }

        Self {
            preset,
            overrides,
            format,
        }
    }

    fn preset_directives(&self) -> Vec<String> {
        let directives: &[&str] = match self.preset {
            LogPreset::Production => &[
                "agentscope::startup=info",
                "agentscope::api=info",
                "agentscope::ws=info",
                "agentscope::monitor=info",
                "agentscope::tmux=info",
                "agentscope::scanner=warn",
                "agentscope::layout=warn",
                "agentscope::tailer=warn",
                "agentscope::activity=warn",
                "agentscope::parser=warn",
                "agentscope::timers=off",
                "agentscope::process=off",
                "tower_http=warn",
            ],
            LogPreset::Verbose => &[
                "agentscope=info",
                "agentscope::timers=off",
                "tower_http=info",
            ],
            LogPreset::Debug => &[
                "agentscope=debug",
                "agentscope::timers=info",
                "tower_http=debug",
            ],
            LogPreset::Trace => &["agentscope=trace", "tower_http=trace"],
            LogPreset::Quiet => &["agentscope=warn", "tower_http=error"],
        };
        directives.iter().map(|d| d.to_string()).collect()
    }

    /// Filter directive string for this configuration, without `RUST_LOG`.
    pub fn directives(&self) -> String {
        let mut directives = self.preset_directives();
        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort();
        for (target, level) in overrides {
            directives.push(format!("{}={}", target, level_to_str(*level)));
        }
        directives.join(",")
    }

    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_level(s: &str) -> Result<Level, ()> {
    match s.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(()),
    }
}

fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
