//! Vendor-neutral activity transitions.
//!
//! Parsers translate records into calls on [`Activity`]; the state machine
//! for tools, turns, waiting and permission stalls lives only here so every
//! vendor behaves the same once normalized.

use crate::approval::ApprovalDetector;
use crate::config::Timing;
use crate::session::{ActiveTool, Session};
use crate::timers::{Scheduler, TimerKind};
use crate::tools::{format_tool_status, ToolKind};
use agentscope_types::ActivityEvent;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Shared, read-only inputs every parser call needs.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub scheduler: Scheduler,
    pub timing: Timing,
    pub approval: ApprovalDetector,
}

/// A session borrowed for the duration of one batch of records.
pub struct Activity<'a> {
    session: &'a mut Session,
    ctx: &'a ParseContext,
}

impl<'a> Activity<'a> {
    pub fn new(session: &'a mut Session, ctx: &'a ParseContext) -> Self {
        Self { session, ctx }
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    fn emit(&self, event: ActivityEvent) {
        self.ctx.scheduler.emit(event);
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.ctx.scheduler.arm(self.session, kind, delay);
    }

    fn arm_permission(&mut self) {
        let delay = self.ctx.timing.permission_delay(self.session.has_shell_tool());
        self.arm(TimerKind::Permission, delay);
    }

    /// New transcript bytes arrived: the agent is evidently not stalled.
    pub fn data_arrived(&mut self) {
        self.session.timers.cancel(TimerKind::Waiting);
        self.session.timers.cancel(TimerKind::Permission);
        if self.session.permission_sent {
            self.session.permission_sent = false;
            self.emit(ActivityEvent::PermissionClear {
                session_id: self.session.id,
            });
        }
    }

    /// After a batch: tools still in flight restart the stall clock.
    pub fn rearm_permission_if_stalled(&mut self) {
        if self.session.has_non_exempt_tools()
            && !self.session.permission_sent
            && !self.session.timers.is_armed(TimerKind::Permission)
        {
            self.arm_permission();
        }
    }

    pub fn tool_started(&mut self, tool_id: &str, name: &str, input: &Value) {
        if tool_id.is_empty() || self.session.active_tools.contains_key(tool_id) {
            return;
        }
        let session_id = self.session.id;
        let kind = ToolKind::classify(name);
        let status = format_tool_status(name, input);

        let was_waiting = self.session.is_waiting;
        self.session.is_waiting = false;
        self.session.had_tools_in_turn = true;
        self.session.timers.cancel(TimerKind::Waiting);
        self.session.active_tools.insert(
            tool_id.to_string(),
            ActiveTool {
                name: name.to_string(),
                status: status.clone(),
                kind,
            },
        );

        if was_waiting {
            self.emit(ActivityEvent::StatusActive { session_id });
        }
        debug!(target: "agentscope::activity", %session_id, tool_id, %status, "Tool started");
        self.emit(ActivityEvent::ToolStart {
            session_id,
            tool_id: tool_id.to_string(),
            status,
        });

        if !kind.is_permission_exempt() {
            self.arm_permission();
        }
    }

    pub fn tool_finished(&mut self, tool_id: &str) {
        let Some(tool) = self.session.active_tools.remove(tool_id) else {
            trace!(target: "agentscope::activity", tool_id, "Result for unknown tool");
            return;
        };
        let session_id = self.session.id;

        if tool.kind == ToolKind::Subtask {
            self.subagent_cleared(tool_id);
        }

        debug!(target: "agentscope::activity", %session_id, tool_id, "Tool finished");
        self.ctx.scheduler.emit_after(
            self.session,
            ActivityEvent::ToolDone {
                session_id,
                tool_id: tool_id.to_string(),
            },
            self.ctx.timing.tool_done_delay(),
        );

        if self.session.active_tools.is_empty() {
            self.session.had_tools_in_turn = false;
        }
        if !self.session.has_non_exempt_tools() {
            self.session.timers.cancel(TimerKind::Permission);
        }
    }

    /// The user typed something: a new turn starts.
    pub fn user_input(&mut self) {
        let session_id = self.session.id;
        let was_permission = self.session.permission_sent;
        self.session.clear_activity();
        self.session.is_waiting = false;

        if was_permission {
            self.emit(ActivityEvent::PermissionClear { session_id });
        }
        debug!(target: "agentscope::activity", %session_id, "New user turn");
        self.emit(ActivityEvent::ToolsClear { session_id });
        self.emit(ActivityEvent::StatusActive { session_id });
    }

    /// An explicit end-of-turn record.
    pub fn turn_ended(&mut self) {
        let delay = self.ctx.timing.turn_end_delay();
        self.arm(TimerKind::Waiting, delay);
    }

    /// Assistant output with no tool call. If the turn used no tools this
    /// is likely the final answer, so start the (longer) idle timer.
    pub fn prose_only(&mut self) {
        if !self.session.had_tools_in_turn {
            let delay = self.ctx.timing.text_idle_delay();
            self.arm(TimerKind::Waiting, delay);
        }
    }

    /// Assistant prose from a vendor that never writes approval records.
    pub fn assistant_prose(&mut self, text: &str) {
        if text.trim().is_empty() || !self.session.has_non_exempt_tools() {
            return;
        }
        if self.ctx.approval.matches(text) {
            debug!(target: "agentscope::activity", session_id = %self.session.id, "Approval request in prose");
            self.permission_requested();
        }
    }

    /// The agent is definitely waiting on an approval prompt.
    pub fn permission_requested(&mut self) {
        self.session.timers.cancel(TimerKind::Permission);
        if !self.session.permission_sent {
            self.session.permission_sent = true;
            self.emit(ActivityEvent::PermissionWait {
                session_id: self.session.id,
            });
        }
    }

    /// A running tool reported progress, so it is not stalled on approval.
    pub fn tool_progress(&mut self) {
        if self.session.has_non_exempt_tools() && !self.session.permission_sent {
            self.arm_permission();
        }
    }

    pub fn subagent_tool_started(
        &mut self,
        parent_tool_id: &str,
        tool_id: &str,
        name: &str,
        input: &Value,
    ) {
        if parent_tool_id.is_empty() || tool_id.is_empty() {
            return;
        }
        let tools = self
            .session
            .subagent_tools
            .entry(parent_tool_id.to_string())
            .or_default();
        if tools.contains_key(tool_id) {
            return;
        }
        let kind = ToolKind::classify(name);
        let status = format_tool_status(name, input);
        tools.insert(
            tool_id.to_string(),
            ActiveTool {
                name: name.to_string(),
                status: status.clone(),
                kind,
            },
        );
        self.session.timers.cancel(TimerKind::Waiting);

        self.emit(ActivityEvent::SubagentToolStart {
            session_id: self.session.id,
            parent_tool_id: parent_tool_id.to_string(),
            tool_id: tool_id.to_string(),
            status,
        });
        if !kind.is_permission_exempt() {
            self.arm_permission();
        }
    }

    pub fn subagent_tool_finished(&mut self, parent_tool_id: &str, tool_id: &str) {
        let Some(tools) = self.session.subagent_tools.get_mut(parent_tool_id) else {
            return;
        };
        if tools.remove(tool_id).is_none() {
            return;
        }
        if tools.is_empty() {
            self.session.subagent_tools.remove(parent_tool_id);
        }

        let session_id = self.session.id;
        self.ctx.scheduler.emit_after(
            self.session,
            ActivityEvent::SubagentToolDone {
                session_id,
                parent_tool_id: parent_tool_id.to_string(),
                tool_id: tool_id.to_string(),
            },
            self.ctx.timing.tool_done_delay(),
        );
        if !self.session.has_non_exempt_tools() {
            self.session.timers.cancel(TimerKind::Permission);
        }
    }

    fn subagent_cleared(&mut self, parent_tool_id: &str) {
        if self.session.subagent_tools.remove(parent_tool_id).is_some() {
            self.emit(ActivityEvent::SubagentClear {
                session_id: self.session.id,
                parent_tool_id: parent_tool_id.to_string(),
            });
        }
    }
}
