//! Test rig for driving a single session without a running monitor.

use crate::activity::{Activity, ParseContext};
use crate::approval::ApprovalDetector;
use crate::config::Timing;
use crate::monitor::MonitorInput;
use crate::parser::ParserRegistry;
use crate::session::Session;
use crate::timers::{on_timer_fired, Scheduler};
use agentscope_types::{ActivityEvent, Vendor};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

pub(crate) struct Harness {
    pub session: Session,
    pub ctx: ParseContext,
    pub parsers: ParserRegistry,
    events: broadcast::Receiver<ActivityEvent>,
    inputs: mpsc::UnboundedReceiver<MonitorInput>,
}

impl Harness {
    pub fn new(vendor: Vendor) -> Self {
        let (inputs_tx, inputs) = mpsc::unbounded_channel();
        let (events_tx, events) = broadcast::channel(256);
        Self {
            session: Session::new(Uuid::new_v4(), vendor, PathBuf::from("/repo")),
            ctx: ParseContext {
                scheduler: Scheduler::new(inputs_tx, events_tx),
                timing: Timing::default(),
                approval: ApprovalDetector::default(),
            },
            parsers: ParserRegistry::default(),
            events,
            inputs,
        }
    }

    pub fn with_activity<R>(&mut self, f: impl FnOnce(&mut Activity<'_>) -> R) -> R {
        let mut activity = Activity::new(&mut self.session, &self.ctx);
        f(&mut activity)
    }

    /// Deliver `lines` as one read batch.
    pub fn feed(&mut self, lines: &[&str]) {
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        self.parsers
            .process_batch(&mut self.session, &lines, &self.ctx);
    }

    pub fn drain(&mut self) -> Vec<ActivityEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn drain_kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ActivityEvent::kind).collect()
    }

    /// Let virtual time pass and deliver any timers that fired meanwhile.
    pub async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        while let Ok(input) = self.inputs.try_recv() {
            if let MonitorInput::TimerFired {
                kind, generation, ..
            } = input
            {
                on_timer_fired(&mut self.session, kind, generation, &self.ctx.scheduler);
            }
        }
    }
}
