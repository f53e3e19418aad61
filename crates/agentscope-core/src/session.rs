//! Per-agent session record.
//!
//! A `Session` owns everything tied to one observed agent: read position in
//! its transcript, the in-flight tool state inferred from it, its timers and
//! its file watchers. Dropping the session releases all of them.

use crate::tailer::Tailer;
use crate::timers::SessionTimers;
use crate::tools::ToolKind;
use agentscope_types::{AgentSnapshot, ToolSnapshot, Vendor};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A tool call that has started but not finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTool {
    pub name: String,
    pub status: String,
    pub kind: ToolKind,
}

impl ActiveTool {
    pub fn is_permission_exempt(&self) -> bool {
        self.kind.is_permission_exempt()
    }
}

/// One observed agent.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub vendor: Vendor,
    pub project_dir: PathBuf,
    /// `None` until the vendor process creates its transcript.
    pub transcript_path: Option<PathBuf>,
    /// Bytes of `transcript_path` already consumed. Never decreases while
    /// the session stays on the same file.
    pub byte_offset: u64,
    /// Bytes read past the last newline, carried to the next read.
    pub line_buffer: Vec<u8>,
    /// In-flight tool calls keyed by tool id.
    pub active_tools: BTreeMap<String, ActiveTool>,
    /// In-flight sub-agent tool calls keyed by parent tool id, then tool id.
    pub subagent_tools: BTreeMap<String, BTreeMap<String, ActiveTool>>,
    pub is_waiting: bool,
    pub permission_sent: bool,
    pub had_tools_in_turn: bool,
    /// When the vendor process was launched by us.
    pub launch_timestamp: Option<DateTime<Utc>>,
    /// Terminal multiplexer target hosting the agent.
    pub terminal: Option<String>,
    /// Adopted by the external-session scan rather than launched or focused.
    pub external: bool,
    /// We opened the terminal window and may tear it down.
    pub launched: bool,
    /// `terminal` is a tmux window target, checked for liveness.
    pub tmux_window: bool,
    pub created_at: DateTime<Utc>,
    pub last_data_at: Option<DateTime<Utc>>,
    pub timers: SessionTimers,
    pub(crate) tail: Option<Tailer>,
}

impl Session {
    pub fn new(id: Uuid, vendor: Vendor, project_dir: PathBuf) -> Self {
        Self {
            id,
            vendor,
            project_dir,
            transcript_path: None,
            byte_offset: 0,
            line_buffer: Vec::new(),
            active_tools: BTreeMap::new(),
            subagent_tools: BTreeMap::new(),
            is_waiting: false,
            permission_sent: false,
            had_tools_in_turn: false,
            launch_timestamp: None,
            terminal: None,
            external: false,
            launched: false,
            tmux_window: false,
            created_at: Utc::now(),
            last_data_at: None,
            timers: SessionTimers::default(),
            tail: None,
        }
    }

    /// True while the vendor has not written the session's first transcript.
    pub fn awaiting_first_file(&self) -> bool {
        match &self.transcript_path {
            None => true,
            Some(path) => self.byte_offset == 0 && !path.exists(),
        }
    }

    pub fn owns_transcript(&self, path: &Path) -> bool {
        self.transcript_path.as_deref() == Some(path)
    }

    /// Any tool (own or sub-agent) that could be blocked on an approval prompt.
    pub fn has_non_exempt_tools(&self) -> bool {
        self.active_tools.values().any(|t| !t.is_permission_exempt())
            || !self.stalled_subagent_parents().is_empty()
    }

    /// Parent tool ids whose sub-agents have non-exempt tools in flight.
    pub fn stalled_subagent_parents(&self) -> Vec<String> {
        self.subagent_tools
            .iter()
            .filter(|(_, tools)| tools.values().any(|t| !t.is_permission_exempt()))
            .map(|(parent, _)| parent.clone())
            .collect()
    }

    /// Whether any in-flight tool is a shell/exec tool.
    pub fn has_shell_tool(&self) -> bool {
        self.active_tools.values().any(|t| t.kind.is_shell())
            || self
                .subagent_tools
                .values()
                .flat_map(|tools| tools.values())
                .any(|t| t.kind.is_shell())
    }

    /// Drop all inferred tool and turn state.
    pub fn clear_activity(&mut self) {
        self.active_tools.clear();
        self.subagent_tools.clear();
        self.had_tools_in_turn = false;
        self.permission_sent = false;
        self.timers.cancel_all();
    }

    /// Point the session at a different transcript, starting from offset zero.
    pub(crate) fn switch_transcript(&mut self, path: PathBuf) {
        self.tail = None;
        self.clear_activity();
        self.timers.cancel_delayed();
        self.is_waiting = false;
        self.transcript_path = Some(path);
        self.byte_offset = 0;
        self.line_buffer.clear();
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        let own = self.active_tools.iter().map(|(id, tool)| ToolSnapshot {
            tool_id: id.clone(),
            name: tool.name.clone(),
            status: tool.status.clone(),
            parent_tool_id: None,
        });
        let nested = self.subagent_tools.iter().flat_map(|(parent, tools)| {
            tools.iter().map(move |(id, tool)| ToolSnapshot {
                tool_id: id.clone(),
                name: tool.name.clone(),
                status: tool.status.clone(),
                parent_tool_id: Some(parent.clone()),
            })
        });

        AgentSnapshot {
            session_id: self.id,
            vendor: self.vendor,
            project_dir: self.project_dir.clone(),
            transcript_path: self.transcript_path.clone(),
            terminal: self.terminal.clone(),
            external: self.external,
            is_waiting: self.is_waiting,
            permission_sent: self.permission_sent,
            byte_offset: self.byte_offset,
            tools: own.chain(nested).collect(),
            created_at: self.created_at,
            last_data_at: self.last_data_at,
        }
    }
}
