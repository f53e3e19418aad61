//! The monitor task: sole owner of every session.
//!
//! File watchers, scan tickers, timers and API callers never touch session
//! state directly. They post a [`MonitorInput`] and the single task running
//! [`Monitor::run`] applies it, so all state transitions happen in one place
//! and in arrival order.

use crate::activity::ParseContext;
use crate::approval::ApprovalDetector;
use crate::config::MonitorConfig;
use crate::error::AgentscopeError;
use crate::layout;
use crate::parser::ParserRegistry;
use crate::process::CommandRunner;
use crate::scanner::{decide, FileDecision, FocusView, ProjectScanner, ScanKey};
use crate::session::Session;
use crate::tailer::{self, Tailer};
use crate::timers::{on_timer_fired, Scheduler, TimerKind};
use crate::tmux::{TmuxClient, TmuxResolver};
use crate::Result;
use agentscope_types::{ActivityEvent, AgentSnapshot, Vendor};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

const EVENT_BUS_CAPACITY: usize = 1024;

/// What the user is currently looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    None,
    Session(Uuid),
    /// A terminal, named by its multiplexer target.
    Terminal(String),
}

/// Parameters for tracking a session.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub vendor: Vendor,
    pub project_dir: PathBuf,
    /// Leave `None` when the vendor has not created its transcript yet.
    pub transcript_path: Option<PathBuf>,
    pub terminal: Option<String>,
    pub launch_timestamp: Option<DateTime<Utc>>,
    pub external: bool,
    pub launched: bool,
    /// Start tailing at the current end of file instead of replaying history.
    pub skip_history: bool,
    /// Make the new session the focused one.
    pub focus: bool,
}

impl RegisterRequest {
    pub fn new(vendor: Vendor, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor,
            project_dir: project_dir.into(),
            transcript_path: None,
            terminal: None,
            launch_timestamp: None,
            external: false,
            launched: false,
            skip_history: false,
            focus: false,
        }
    }

    pub fn transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_path = Some(path.into());
        self
    }

    pub fn terminal(mut self, name: impl Into<String>) -> Self {
        self.terminal = Some(name.into());
        self
    }

    pub fn launched_at(mut self, at: DateTime<Utc>) -> Self {
        self.launch_timestamp = Some(at);
        self
    }

    pub fn focused(mut self) -> Self {
        self.focus = true;
        self
    }

    pub fn skip_history(mut self) -> Self {
        self.skip_history = true;
        self
    }
}

/// Messages processed by the monitor task.
#[derive(Debug)]
pub enum MonitorInput {
    /// A session's transcript may have grown.
    FileChanged(Uuid),
    /// Look for new transcripts for one (vendor, workspace) pair.
    ScanTick(ScanKey),
    /// Look for active transcripts nobody tracks, and prune stale ones.
    ExternalScanTick,
    TimerFired {
        session_id: Uuid,
        kind: TimerKind,
        generation: u64,
    },
    /// Start scanning a workspace for a vendor.
    Watch(ScanKey),
    Focus(Focus),
    /// The terminal with this name went away.
    TerminalClosed(String),
    Register {
        request: RegisterRequest,
        reply: oneshot::Sender<Uuid>,
    },
    Launch {
        vendor: Vendor,
        project_dir: PathBuf,
        reply: oneshot::Sender<Result<Uuid>>,
    },
    Reattach {
        session_id: Uuid,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    Close {
        session_id: Uuid,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot(oneshot::Sender<Vec<AgentSnapshot>>),
    Shutdown,
}

/// Cloneable front door to a running [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    inputs: mpsc::UnboundedSender<MonitorInput>,
    events: broadcast::Sender<ActivityEvent>,
}

impl MonitorHandle {
    /// Receive every activity event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.events.subscribe()
    }

    pub fn send(&self, input: MonitorInput) -> Result<()> {
        self.inputs
            .send(input)
            .map_err(|_| AgentscopeError::ChannelClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> MonitorInput) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| AgentscopeError::ChannelClosed)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Uuid> {
        self.request(|reply| MonitorInput::Register { request, reply })
            .await
    }

    /// Open a terminal running `vendor`'s CLI in `project_dir` and track it.
    pub async fn launch(&self, vendor: Vendor, project_dir: PathBuf) -> Result<Uuid> {
        self.request(|reply| MonitorInput::Launch {
            vendor,
            project_dir,
            reply,
        })
        .await?
    }

    pub async fn reattach(&self, session_id: Uuid) -> Result<Option<String>> {
        self.request(|reply| MonitorInput::Reattach { session_id, reply })
            .await?
    }

    pub async fn close(&self, session_id: Uuid) -> Result<()> {
        self.request(|reply| MonitorInput::Close { session_id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Vec<AgentSnapshot>> {
        self.request(MonitorInput::Snapshot).await
    }

    pub fn watch(&self, vendor: Vendor, project_dir: impl Into<PathBuf>) -> Result<()> {
        self.send(MonitorInput::Watch(ScanKey::new(vendor, project_dir)))
    }

    pub fn focus(&self, focus: Focus) -> Result<()> {
        self.send(MonitorInput::Focus(focus))
    }

    pub fn terminal_closed(&self, name: impl Into<String>) -> Result<()> {
        self.send(MonitorInput::TerminalClosed(name.into()))
    }

    /// Run the external-session scan now instead of waiting for its tick.
    pub fn scan_now(&self) -> Result<()> {
        self.send(MonitorInput::ExternalScanTick)
    }

    pub fn shutdown(&self) {
        let _ = self.inputs.send(MonitorInput::Shutdown);
    }
}

pub struct Monitor {
    config: MonitorConfig,
    sessions: HashMap<Uuid, Session>,
    scanners: HashMap<ScanKey, ProjectScanner>,
    /// Transcripts of closed or reassigned sessions, never adopted again.
    retired: HashSet<PathBuf>,
    parsers: ParserRegistry,
    ctx: ParseContext,
    focus: Focus,
    tmux: TmuxClient,
    resolver: TmuxResolver,
    inputs: mpsc::UnboundedSender<MonitorInput>,
    receiver: mpsc::UnboundedReceiver<MonitorInput>,
    events: broadcast::Sender<ActivityEvent>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let runner = CommandRunner::new(config.timing.command_timeout());

        Self {
            ctx: ParseContext {
                scheduler: Scheduler::new(inputs.clone(), events.clone()),
                timing: config.timing.clone(),
                approval: ApprovalDetector::default(),
            },
            tmux: TmuxClient::new(config.tmux.tmux_bin.clone(), runner.clone()),
            resolver: TmuxResolver::new(&config.tmux, runner),
            config,
            sessions: HashMap::new(),
            scanners: HashMap::new(),
            retired: HashSet::new(),
            parsers: ParserRegistry::default(),
            focus: Focus::None,
            inputs,
            receiver,
            events,
        }
    }

    pub fn with_approval_detector(mut self, detector: ApprovalDetector) -> Self {
        self.ctx.approval = detector;
        self
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            inputs: self.inputs.clone(),
            events: self.events.clone(),
        }
    }

    /// Spawn the monitor task.
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Process inputs until [`MonitorHandle::shutdown`].
    pub async fn run(mut self) {
        let external_ticker = self.start_external_ticker();
        info!(target: "agentscope::monitor", "Monitor started");

        while let Some(input) = self.receiver.recv().await {
            if matches!(input, MonitorInput::Shutdown) {
                break;
            }
            self.handle_input(input).await;
        }

        if let Some(ticker) = external_ticker {
            ticker.abort();
        }
        info!(target: "agentscope::monitor", sessions = self.sessions.len(), "Monitor stopped");
    }

    fn start_external_ticker(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.timing.external_scan_interval()?;
        let inputs = self.inputs.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if inputs.send(MonitorInput::ExternalScanTick).is_err() {
                    break;
                }
            }
        }))
    }

    async fn handle_input(&mut self, input: MonitorInput) {
        match input {
            MonitorInput::FileChanged(id) => self.ingest(id),
            MonitorInput::ScanTick(key) => self.scan_tick(&key),
            MonitorInput::ExternalScanTick => self.external_scan().await,
            MonitorInput::TimerFired {
                session_id,
                kind,
                generation,
            } => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    on_timer_fired(session, kind, generation, &self.ctx.scheduler);
                }
            }
            MonitorInput::Watch(key) => self.ensure_scanner(key),
            MonitorInput::Focus(focus) => self.set_focus(focus),
            MonitorInput::TerminalClosed(name) => self.terminal_closed(&name),
            MonitorInput::Register { request, reply } => {
                let id = self.register(Uuid::new_v4(), request);
                let _ = reply.send(id);
            }
            MonitorInput::Launch {
                vendor,
                project_dir,
                reply,
            } => {
                let result = self.launch(vendor, project_dir).await;
                let _ = reply.send(result);
            }
            MonitorInput::Reattach { session_id, reply } => {
                let result = self.reattach(session_id).await;
                let _ = reply.send(result);
            }
            MonitorInput::Close { session_id, reply } => {
                let result = self.close(session_id).await;
                let _ = reply.send(result);
            }
            MonitorInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            MonitorInput::Shutdown => {}
        }
    }

    fn emit(&self, event: ActivityEvent) {
        self.ctx.scheduler.emit(event);
    }

    /// Read and dispatch whatever is new in a session's transcript.
    fn ingest(&mut self, id: Uuid) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        let lines = match tailer::read_new_lines(session) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(target: "agentscope::monitor", session_id = %id, error = %e, "Failed to read transcript");
                return;
            }
        };
        if lines.is_empty() {
            return;
        }
        trace!(target: "agentscope::monitor", session_id = %id, lines = lines.len(), offset = session.byte_offset, "Ingesting");
        session.last_data_at = Some(Utc::now());
        self.parsers.process_batch(session, &lines, &self.ctx);
    }

    /// Start tracking a session under `id`.
    fn register(&mut self, id: Uuid, request: RegisterRequest) -> Uuid {
        let key = ScanKey::new(request.vendor, request.project_dir.clone());
        let mut session = Session::new(id, request.vendor, request.project_dir);
        session.transcript_path = request.transcript_path;
        session.terminal = request.terminal;
        session.launch_timestamp = request.launch_timestamp;
        session.external = request.external;
        session.launched = request.launched;
        session.tmux_window = session.terminal.is_some() && (request.launched || request.external);
        if request.skip_history {
            tailer::skip_to_end(&mut session);
        }
        if let Some(path) = session.transcript_path.clone() {
            if let Some(scanner) = self.scanners.get_mut(&key) {
                scanner.mark_known(path.clone());
            }
            session.tail = Some(Tailer::start(
                id,
                path,
                &self.config.timing,
                self.inputs.clone(),
            ));
        }

        info!(
            target: "agentscope::monitor",
            session_id = %id,
            vendor = %session.vendor,
            project_dir = %session.project_dir.display(),
            external = session.external,
            "Tracking session"
        );
        self.emit(ActivityEvent::AgentCreated {
            session_id: id,
            vendor: session.vendor,
            project_dir: session.project_dir.clone(),
            external: session.external,
        });
        self.sessions.insert(id, session);
        if request.focus {
            self.focus = Focus::Session(id);
        }
        self.ensure_scanner(key);
        self.ingest(id);
        id
    }

    fn ensure_scanner(&mut self, key: ScanKey) {
        if self.scanners.contains_key(&key) {
            return;
        }
        // While a launched session waits for its first transcript, files
        // newer than the launch must stay "new" so the scanner can hand the
        // first one to it.
        let skew = chrono::Duration::from_std(self.config.timing.launch_skew())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let seed_before = self
            .sessions
            .values()
            .filter(|s| ScanKey::of(s) == key && s.awaiting_first_file())
            .filter_map(|s| s.launch_timestamp)
            .min()
            .map(|launch| launch - skew);

        let scanner = ProjectScanner::start(
            key.clone(),
            &self.config.paths,
            seed_before,
            self.config.timing.scan_interval(),
            self.inputs.clone(),
        );
        debug!(target: "agentscope::monitor", vendor = %key.vendor, dir = %scanner.dir().display(), "Watching project");
        self.scanners.insert(key, scanner);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = match focus {
            Focus::Terminal(name) => match self
                .sessions
                .values()
                .find(|s| s.terminal.as_deref() == Some(name.as_str()))
            {
                Some(session) => Focus::Session(session.id),
                None => Focus::Terminal(name),
            },
            other => other,
        };
        trace!(target: "agentscope::monitor", focus = ?self.focus, "Focus changed");
    }

    fn scan_tick(&mut self, key: &ScanKey) {
        let Some(scanner) = self.scanners.get_mut(key) else {
            return;
        };
        for file in scanner.new_files() {
            if self.sessions.values().any(|s| s.owns_transcript(&file)) {
                continue;
            }
            let decision = {
                let session = match &self.focus {
                    Focus::Session(id) => self.sessions.get(id),
                    _ => None,
                };
                let unowned_terminal = match &self.focus {
                    Focus::Terminal(name)
                        if !self
                            .sessions
                            .values()
                            .any(|s| s.terminal.as_deref() == Some(name.as_str())) =>
                    {
                        Some(name.as_str())
                    }
                    _ => None,
                };
                decide(
                    key,
                    &file,
                    FocusView {
                        session,
                        unowned_terminal,
                        launch_skew: self.config.timing.launch_skew(),
                    },
                )
            };
            match decision {
                FileDecision::Reassign(id) => self.reassign(id, file),
                FileDecision::Adopt(terminal) => {
                    let request = RegisterRequest::new(key.vendor, key.project_dir.clone())
                        .transcript(file)
                        .terminal(terminal)
                        .focused();
                    self.register(Uuid::new_v4(), request);
                }
                FileDecision::Pending => {
                    trace!(target: "agentscope::monitor", file = %file.display(), "New transcript not readable yet");
                    if let Some(scanner) = self.scanners.get_mut(key) {
                        scanner.forget(&file);
                    }
                }
                FileDecision::Ignore => {
                    trace!(target: "agentscope::monitor", file = %file.display(), "New transcript left alone");
                }
            }
        }
    }

    /// Move a session onto a different transcript file.
    fn reassign(&mut self, id: Uuid, path: PathBuf) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        let had_permission = session.permission_sent;
        if let Some(old) = session.transcript_path.take() {
            self.retired.insert(old);
        }
        info!(target: "agentscope::monitor", session_id = %id, path = %path.display(), "Transcript switched");

        session.switch_transcript(path.clone());
        session.tail = Some(Tailer::start(
            id,
            path.clone(),
            &self.config.timing,
            self.inputs.clone(),
        ));

        if had_permission {
            self.emit(ActivityEvent::PermissionClear { session_id: id });
        }
        self.emit(ActivityEvent::ToolsClear { session_id: id });
        self.emit(ActivityEvent::TranscriptSwitched {
            session_id: id,
            transcript_path: path,
        });
        self.ingest(id);
    }

    /// Adopt active transcripts nobody tracks, then prune stale adoptions.
    async fn external_scan(&mut self) {
        let now = Utc::now();
        let active_window = chrono::Duration::from_std(self.config.timing.external_active_window())
            .unwrap_or_else(|_| chrono::Duration::zero());

        let keys: Vec<ScanKey> = self.scanners.keys().cloned().collect();
        for key in keys {
            let dir = layout::sessions_dir(&self.config.paths, key.vendor, &key.project_dir);
            let mut terminal: Option<Option<String>> = None;

            for path in layout::list_transcripts(key.vendor, &dir) {
                if self.retired.contains(&path)
                    || self.sessions.values().any(|s| s.owns_transcript(&path))
                    || !self.scanners.get(&key).is_some_and(|s| s.is_known(&path))
                {
                    continue;
                }
                let Some(modified) = layout::modified_at(&path) else {
                    continue;
                };
                if now - modified > active_window {
                    continue;
                }
                if key.vendor.matches_by_content()
                    && !layout::read_session_meta(&path).is_some_and(|m| m.cwd == key.project_dir)
                {
                    continue;
                }

                if terminal.is_none() {
                    terminal = Some(
                        self.resolver
                            .resolve(key.vendor.binary_name(), &key.project_dir)
                            .await,
                    );
                }
                let mut request = RegisterRequest::new(key.vendor, key.project_dir.clone())
                    .transcript(path)
                    .skip_history();
                request.external = true;
                request.terminal = terminal.clone().flatten();
                self.register(Uuid::new_v4(), request);
            }
        }

        self.prune_external(now);
        self.reap_closed_windows().await;
    }

    /// Drop sessions whose tmux window no longer exists. Without a reachable
    /// tmux server nothing is reaped.
    async fn reap_closed_windows(&mut self) {
        if !self.sessions.values().any(|s| s.tmux_window) {
            return;
        }
        let live = match self.tmux.live_windows().await {
            Ok(live) => live,
            Err(e) => {
                trace!(target: "agentscope::monitor", error = %e, "Window liveness unknown");
                return;
            }
        };
        let gone: HashSet<String> = self
            .sessions
            .values()
            .filter(|s| s.tmux_window)
            .filter_map(|s| s.terminal.clone())
            .filter(|target| !live.contains(target))
            .collect();
        for target in gone {
            debug!(target: "agentscope::monitor", %target, "Terminal window closed");
            self.terminal_closed(&target);
        }
    }

    fn prune_external(&mut self, now: DateTime<Utc>) {
        let stale_after = chrono::Duration::from_std(self.config.timing.stale_session_timeout())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|s| s.external)
            .filter(|s| {
                s.transcript_path
                    .as_deref()
                    .and_then(layout::modified_at)
                    .is_none_or(|modified| now - modified > stale_after)
            })
            .filter(|s| s.last_data_at.is_none_or(|at| now - at > stale_after))
            .map(|s| s.id)
            .collect();
        for id in stale {
            debug!(target: "agentscope::monitor", session_id = %id, "Pruning stale external session");
            self.remove(id);
        }
    }

    fn remove(&mut self, id: Uuid) -> Option<Session> {
        let mut session = self.sessions.remove(&id)?;
        session.tail = None;
        session.timers.cancel_all();
        session.timers.cancel_delayed();
        if let Some(path) = &session.transcript_path {
            self.retired.insert(path.clone());
        }
        if self.focus == Focus::Session(id) {
            self.focus = Focus::None;
        }
        info!(target: "agentscope::monitor", session_id = %id, "Session closed");
        self.emit(ActivityEvent::AgentClosed { session_id: id });
        Some(session)
    }

    fn terminal_closed(&mut self, name: &str) {
        let ids: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|s| s.terminal.as_deref() == Some(name))
            .map(|s| s.id)
            .collect();
        for id in ids {
            self.remove(id);
        }
        if self.focus == Focus::Terminal(name.to_string()) {
            self.focus = Focus::None;
        }
    }

    async fn launch(&mut self, vendor: Vendor, project_dir: PathBuf) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let launched_at = Utc::now();
        let command = launch_command(vendor, id);
        let window = format!("{vendor}-{}", &id.simple().to_string()[..8]);

        let terminal = self
            .tmux
            .open_window(&self.config.tmux.session_name, &window, &project_dir, &command)
            .await?;

        let mut request = RegisterRequest::new(vendor, project_dir.clone())
            .terminal(terminal)
            .launched_at(launched_at)
            .focused();
        request.transcript_path =
            layout::predicted_transcript(&self.config.paths, vendor, &project_dir, id);
        request.launched = true;
        Ok(self.register(id, request))
    }

    async fn reattach(&mut self, id: Uuid) -> Result<Option<String>> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(AgentscopeError::SessionNotFound(id))?;
        // The window we opened is authoritative.
        if session.launched && session.terminal.is_some() {
            return Ok(session.terminal.clone());
        }
        let (vendor, project_dir) = (session.vendor, session.project_dir.clone());
        let terminal = self
            .resolver
            .resolve(vendor.binary_name(), &project_dir)
            .await;
        if let (Some(target), Some(session)) = (&terminal, self.sessions.get_mut(&id)) {
            session.terminal = Some(target.clone());
            session.tmux_window = true;
        }
        Ok(terminal)
    }

    async fn close(&mut self, id: Uuid) -> Result<()> {
        let session = self
            .remove(id)
            .ok_or(AgentscopeError::SessionNotFound(id))?;
        if session.launched {
            if let Some(target) = &session.terminal {
                if let Err(e) = self.tmux.kill_window(target).await {
                    debug!(target: "agentscope::monitor", %target, error = %e, "Failed to close window");
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<AgentSnapshot> {
        let mut agents: Vec<AgentSnapshot> = self.sessions.values().map(Session::snapshot).collect();
        agents.sort_by_key(|a| a.created_at);
        agents
    }
}

/// Command typed into a fresh terminal. Claude accepts the session id up
/// front, which pins the transcript file name.
fn launch_command(vendor: Vendor, id: Uuid) -> String {
    match vendor {
        Vendor::Claude => format!("{} --session-id {id}", vendor.binary_name()),
        other => other.binary_name().to_string(),
    }
}
