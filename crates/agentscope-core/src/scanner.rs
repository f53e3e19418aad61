//! Detection of newly created transcripts in a project's session directory.
//!
//! A scanner remembers every transcript it has already seen for one
//! (vendor, workspace) pair. On each tick the unseen files are handed to
//! [`decide`], which either reassigns the focused session to the new file
//! (the agent cleared its history and started a fresh transcript), adopts
//! it for a focused terminal we don't track yet, or leaves it alone.

use crate::config::VendorPaths;
use crate::layout;
use crate::monitor::MonitorInput;
use crate::session::Session;
use agentscope_types::Vendor;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;
use uuid::Uuid;

/// One scanned (vendor, workspace) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanKey {
    pub vendor: Vendor,
    pub project_dir: PathBuf,
}

impl ScanKey {
    pub fn new(vendor: Vendor, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor,
            project_dir: project_dir.into(),
        }
    }

    pub fn of(session: &Session) -> Self {
        Self::new(session.vendor, session.project_dir.clone())
    }
}

pub struct ProjectScanner {
    key: ScanKey,
    dir: PathBuf,
    known: HashSet<PathBuf>,
    ticker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ProjectScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectScanner")
            .field("key", &self.key)
            .field("dir", &self.dir)
            .field("known", &self.known.len())
            .finish()
    }
}

impl ProjectScanner {
    /// Start ticking for `key` every `interval` (`None` never ticks).
    /// Existing files whose modification time is before `seed_before` are
    /// marked known; `None` marks every existing file.
    pub fn start(
        key: ScanKey,
        paths: &VendorPaths,
        seed_before: Option<DateTime<Utc>>,
        interval: Option<Duration>,
        inputs: mpsc::UnboundedSender<MonitorInput>,
    ) -> Self {
        let dir = layout::sessions_dir(paths, key.vendor, &key.project_dir);
        let known = layout::list_transcripts(key.vendor, &dir)
            .into_iter()
            .filter(|path| match seed_before {
                None => true,
                Some(cutoff) => layout::modified_at(path).is_some_and(|t| t < cutoff),
            })
            .collect::<HashSet<_>>();
        trace!(target: "agentscope::scanner", dir = %dir.display(), seeded = known.len(), "Scanner started");

        let ticker = interval.map(|interval| {
            let tick_key = key.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if inputs.send(MonitorInput::ScanTick(tick_key.clone())).is_err() {
                        break;
                    }
                }
            })
        });

        Self {
            key,
            dir,
            known,
            ticker,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_known(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    pub fn mark_known(&mut self, path: PathBuf) {
        self.known.insert(path);
    }

    /// Report `path` again on the next [`Self::new_files`].
    pub fn forget(&mut self, path: &Path) {
        self.known.remove(path);
    }

    /// Transcripts that appeared since the last call, oldest first.
    pub fn new_files(&mut self) -> Vec<PathBuf> {
        let mut fresh: Vec<PathBuf> = layout::list_transcripts(self.key.vendor, &self.dir)
            .into_iter()
            .filter(|p| !self.known.contains(p))
            .collect();
        fresh.sort_by_key(|p| layout::modified_at(p));
        self.known.extend(fresh.iter().cloned());
        fresh
    }
}

impl Drop for ProjectScanner {
    fn drop(&mut self) {
        if let Some(ticker) = &self.ticker {
            ticker.abort();
        }
    }
}

/// What to do with a newly seen transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDecision {
    /// Move the focused session onto the file.
    Reassign(Uuid),
    /// Track the file as a new session in the focused terminal.
    Adopt(String),
    /// The file's metadata is not written yet; look again next tick.
    Pending,
    Ignore,
}

/// Focus state relevant to [`decide`].
#[derive(Debug, Clone, Copy)]
pub struct FocusView<'a> {
    pub session: Option<&'a Session>,
    /// Focused terminal not hosting any tracked session.
    pub unowned_terminal: Option<&'a str>,
    pub launch_skew: Duration,
}

pub fn decide(key: &ScanKey, file: &Path, focus: FocusView<'_>) -> FileDecision {
    if let Some(session) = focus.session {
        if session.vendor != key.vendor || session.project_dir != key.project_dir {
            return FileDecision::Ignore;
        }
        if session.owns_transcript(file) {
            return FileDecision::Ignore;
        }
        if key.vendor.matches_by_content() {
            let Some(meta) = layout::read_session_meta(file) else {
                return FileDecision::Pending;
            };
            if !layout::matches_workspace(
                &meta,
                layout::modified_at(file),
                &session.project_dir,
                session.launch_timestamp,
                focus.launch_skew,
            ) {
                return FileDecision::Ignore;
            }
        }
        return FileDecision::Reassign(session.id);
    }

    if let Some(terminal) = focus.unowned_terminal {
        if key.vendor.matches_by_content() {
            match layout::read_session_meta(file) {
                None => return FileDecision::Pending,
                Some(meta) if meta.cwd != key.project_dir => return FileDecision::Ignore,
                Some(_) => {}
            }
        }
        return FileDecision::Adopt(terminal.to_string());
    }

    FileDecision::Ignore
}
