//! Transcript tailing and activity inference for Agentscope.
//!
//! A [`Monitor`] follows the JSONL transcripts that AI coding-assistant CLIs
//! write while they work and turns them into a stream of normalized
//! [`agentscope_types::ActivityEvent`]s: which tool is running, whether the
//! agent is waiting for input, and whether it looks blocked on an approval.

mod activity;
mod approval;
mod config;
mod error;
mod layout;
mod monitor;
mod parser;
mod process;
mod scanner;
mod session;
mod tailer;
mod timers;
mod tmux;
mod tools;

#[cfg(test)]
mod testing;

pub use activity::{Activity, ParseContext};
pub use approval::{looks_like_approval_request, ApprovalDetector};
pub use config::{MonitorConfig, Timing, TmuxSettings, VendorPaths};
pub use error::{AgentscopeError, TmuxError};
pub use layout::{project_hash, sessions_dir};
pub use monitor::{Focus, Monitor, MonitorHandle, MonitorInput, RegisterRequest};
pub use parser::{
    ClaudeParser, CodexParser, NativeParser, OpencodeParser, ParserRegistry, TranscriptParser,
};
pub use scanner::ScanKey;
pub use session::{ActiveTool, Session};
pub use tailer::{read_new_lines, split_lines};
pub use timers::TimerKind;
pub use tools::{format_tool_status, ToolKind};

/// Result type for Agentscope operations.
pub type Result<T> = std::result::Result<T, AgentscopeError>;
