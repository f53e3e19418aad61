//! Read model of tracked agents for late-joining clients.

use crate::Vendor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// An in-flight tool as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSnapshot {
    pub tool_id: String,
    pub name: String,
    pub status: String,
    /// Set for tools run by a sub-agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_id: Option<String>,
}

/// Point-in-time view of one observed agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub session_id: Uuid,
    pub vendor: Vendor,
    pub project_dir: PathBuf,
    /// `None` while the vendor process has not created its file yet.
    pub transcript_path: Option<PathBuf>,
    /// Terminal multiplexer session hosting the agent, when known.
    pub terminal: Option<String>,
    /// Adopted from a process this tool did not launch.
    pub external: bool,
    pub is_waiting: bool,
    pub permission_sent: bool,
    pub byte_offset: u64,
    pub tools: Vec<ToolSnapshot>,
    pub created_at: DateTime<Utc>,
    pub last_data_at: Option<DateTime<Utc>>,
}
