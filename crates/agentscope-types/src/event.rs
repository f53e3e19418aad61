//! Canonical activity events consumed by the visualization layer.

use crate::Vendor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One normalized state change for an observed agent.
///
/// Serialized as `{"type":"tool-start","sessionId":"...","toolId":"...","status":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ActivityEvent {
    /// A tool call started.
    ToolStart {
        session_id: Uuid,
        tool_id: String,
        status: String,
    },
    /// A tool call finished (emitted after a short display delay).
    ToolDone { session_id: Uuid, tool_id: String },
    /// All in-flight tools were dropped (new turn, reassignment).
    ToolsClear { session_id: Uuid },
    /// The agent is working.
    StatusActive { session_id: Uuid },
    /// The agent finished its turn and is waiting for the user.
    StatusWaiting { session_id: Uuid },
    /// The agent appears blocked on a human approval.
    PermissionWait { session_id: Uuid },
    /// A previously signalled permission stall is over.
    PermissionClear { session_id: Uuid },
    /// A sub-agent spawned by `parent_tool_id` started a tool.
    SubagentToolStart {
        session_id: Uuid,
        parent_tool_id: String,
        tool_id: String,
        status: String,
    },
    /// A sub-agent tool finished.
    SubagentToolDone {
        session_id: Uuid,
        parent_tool_id: String,
        tool_id: String,
    },
    /// The sub-task owned by `parent_tool_id` is over; drop its tools.
    SubagentClear {
        session_id: Uuid,
        parent_tool_id: String,
    },
    /// A sub-agent appears blocked on a human approval.
    SubagentPermissionWait {
        session_id: Uuid,
        parent_tool_id: String,
    },
    /// A new agent is being tracked.
    AgentCreated {
        session_id: Uuid,
        vendor: Vendor,
        project_dir: PathBuf,
        external: bool,
    },
    /// An agent is no longer tracked.
    AgentClosed { session_id: Uuid },
    /// The agent's transcript moved to a different file (history cleared).
    TranscriptSwitched {
        session_id: Uuid,
        transcript_path: PathBuf,
    },
}

impl ActivityEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            ActivityEvent::ToolStart { session_id, .. }
            | ActivityEvent::ToolDone { session_id, .. }
            | ActivityEvent::ToolsClear { session_id }
            | ActivityEvent::StatusActive { session_id }
            | ActivityEvent::StatusWaiting { session_id }
            | ActivityEvent::PermissionWait { session_id }
            | ActivityEvent::PermissionClear { session_id }
            | ActivityEvent::SubagentToolStart { session_id, .. }
            | ActivityEvent::SubagentToolDone { session_id, .. }
            | ActivityEvent::SubagentClear { session_id, .. }
            | ActivityEvent::SubagentPermissionWait { session_id, .. }
            | ActivityEvent::AgentCreated { session_id, .. }
            | ActivityEvent::AgentClosed { session_id }
            | ActivityEvent::TranscriptSwitched { session_id, .. } => *session_id,
        }
    }

    /// Wire name of the event (`tool-start`, `status-waiting`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::ToolStart { .. } => "tool-start",
            ActivityEvent::ToolDone { .. } => "tool-done",
            ActivityEvent::ToolsClear { .. } => "tools-clear",
            ActivityEvent::StatusActive { .. } => "status-active",
            ActivityEvent::StatusWaiting { .. } => "status-waiting",
            ActivityEvent::PermissionWait { .. } => "permission-wait",
            ActivityEvent::PermissionClear { .. } => "permission-clear",
            ActivityEvent::SubagentToolStart { .. } => "subagent-tool-start",
            ActivityEvent::SubagentToolDone { .. } => "subagent-tool-done",
            ActivityEvent::SubagentClear { .. } => "subagent-clear",
            ActivityEvent::SubagentPermissionWait { .. } => "subagent-permission-wait",
            ActivityEvent::AgentCreated { .. } => "agent-created",
            ActivityEvent::AgentClosed { .. } => "agent-closed",
            ActivityEvent::TranscriptSwitched { .. } => "transcript-switched",
        }
    }
}
