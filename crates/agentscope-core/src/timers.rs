//! Per-session waiting and permission timers.
//!
//! A timer is a spawned task that sleeps and then posts
//! [`MonitorInput::TimerFired`] back to the monitor, so expiry is handled on
//! the same task that owns the session. Each arm bumps a generation counter;
//! a fired timer whose generation no longer matches was cancelled or
//! replaced while its message was in flight and is ignored.

use crate::monitor::MonitorInput;
use crate::session::Session;
use agentscope_types::ActivityEvent;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Turn-end debounce; expiry marks the session waiting for input.
    Waiting,
    /// Tool-stall detector; expiry reports a probable approval prompt.
    Permission,
}

#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// The two timer slots a session can have armed, plus delayed events still
/// waiting to be published.
#[derive(Debug, Default)]
pub struct SessionTimers {
    waiting: Option<PendingTimer>,
    permission: Option<PendingTimer>,
    generation: u64,
    delayed: Vec<JoinHandle<()>>,
}

impl SessionTimers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<PendingTimer> {
        match kind {
            TimerKind::Waiting => &mut self.waiting,
            TimerKind::Permission => &mut self.permission,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Waiting => self.waiting.is_some(),
            TimerKind::Permission => self.permission.is_some(),
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(timer) = self.slot(kind).take() {
            timer.handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::Waiting);
        self.cancel(TimerKind::Permission);
    }

    /// Drop delayed events that have not been published yet.
    pub fn cancel_delayed(&mut self) {
        for handle in self.delayed.drain(..) {
            handle.abort();
        }
    }

    pub fn pending_delayed(&self) -> usize {
        self.delayed.iter().filter(|h| !h.is_finished()).count()
    }

    fn track_delayed(&mut self, handle: JoinHandle<()>) {
        self.delayed.retain(|h| !h.is_finished());
        self.delayed.push(handle);
    }

    /// Replace whatever is in the slot with a fresh timer.
    fn arm(&mut self, kind: TimerKind, spawn: impl FnOnce(u64) -> JoinHandle<()>) {
        self.cancel(kind);
        self.generation += 1;
        let generation = self.generation;
        *self.slot(kind) = Some(PendingTimer {
            generation,
            handle: spawn(generation),
        });
    }

    /// Clear the slot if `generation` is the one currently armed.
    fn complete(&mut self, kind: TimerKind, generation: u64) -> bool {
        let slot = self.slot(kind);
        if slot.as_ref().is_some_and(|t| t.generation == generation) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
        self.cancel_delayed();
    }
}

/// Arms session timers and publishes events, immediately or after a delay.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inputs: mpsc::UnboundedSender<MonitorInput>,
    events: broadcast::Sender<ActivityEvent>,
}

impl Scheduler {
    pub fn new(
        inputs: mpsc::UnboundedSender<MonitorInput>,
        events: broadcast::Sender<ActivityEvent>,
    ) -> Self {
        Self { inputs, events }
    }

    /// (Re)start a session timer. Any timer of the same kind is cancelled.
    pub fn arm(&self, session: &mut Session, kind: TimerKind, delay: Duration) {
        let session_id = session.id;
        let inputs = self.inputs.clone();
        session.timers.arm(kind, |generation| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = inputs.send(MonitorInput::TimerFired {
                    session_id,
                    kind,
                    generation,
                });
            })
        });
        trace!(target: "agentscope::timers", %session_id, ?kind, ?delay, "Timer armed");
    }

    pub fn emit(&self, event: ActivityEvent) {
        trace!(target: "agentscope::timers", kind = event.kind(), session_id = %event.session_id(), "Emit");
        // No subscribers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }

    /// Publish `event` after `delay` without blocking the caller. The
    /// pending event belongs to `session` and is dropped with it.
    pub fn emit_after(&self, session: &mut Session, event: ActivityEvent, delay: Duration) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(target: "agentscope::timers", kind = event.kind(), session_id = %event.session_id(), "Emit delayed");
            let _ = events.send(event);
        });
        session.timers.track_delayed(handle);
    }
}

/// Handle a timer expiry posted by [`Scheduler::arm`].
pub fn on_timer_fired(
    session: &mut Session,
    kind: TimerKind,
    generation: u64,
    scheduler: &Scheduler,
) {
    if !session.timers.complete(kind, generation) {
        trace!(target: "agentscope::timers", session_id = %session.id, ?kind, generation, "Stale timer ignored");
        return;
    }
    match kind {
        TimerKind::Waiting => waiting_expired(session, scheduler),
        TimerKind::Permission => permission_expired(session, scheduler),
    }
}

fn waiting_expired(session: &mut Session, scheduler: &Scheduler) {
    let session_id = session.id;
    if !session.active_tools.is_empty() || !session.subagent_tools.is_empty() {
        session.active_tools.clear();
        session.subagent_tools.clear();
        session.timers.cancel(TimerKind::Permission);
        scheduler.emit(ActivityEvent::ToolsClear { session_id });
    }
    session.is_waiting = true;
    session.had_tools_in_turn = false;
    debug!(target: "agentscope::timers", %session_id, "Session waiting for input");
    scheduler.emit(ActivityEvent::StatusWaiting { session_id });
}

fn permission_expired(session: &mut Session, scheduler: &Scheduler) {
    let session_id = session.id;
    let stalled_parents = session.stalled_subagent_parents();
    let own_stalled = session.active_tools.values().any(|t| !t.is_permission_exempt());
    if !own_stalled && stalled_parents.is_empty() {
        return;
    }

    session.permission_sent = true;
    debug!(target: "agentscope::timers", %session_id, "Tool stalled, likely awaiting approval");
    scheduler.emit(ActivityEvent::PermissionWait { session_id });
    for parent_tool_id in stalled_parents {
        scheduler.emit(ActivityEvent::SubagentPermissionWait {
            session_id,
            parent_tool_id,
        });
    }
}
