//! Incremental transcript reading and change notification.
//!
//! Reads are offset-based and idempotent: a notification with nothing new
//! reads nothing. Change notifications come from three independent sources
//! (native fs events, a stat-based poll watcher and a plain interval) because
//! each one is unreliable on some platform; duplicate wakeups are harmless.

use crate::config::Timing;
use crate::monitor::MonitorInput;
use crate::session::Session;
use crate::Result;
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

/// Read everything appended to the session's transcript since the last call
/// and return the complete lines.
///
/// The offset advances by the number of bytes read before any line is
/// handed back, so a line is never consumed twice. A file at or below the
/// current offset yields nothing (truncation is not followed).
pub fn read_new_lines(session: &mut Session) -> Result<Vec<String>> {
    let Some(path) = session.transcript_path.as_deref() else {
        return Ok(Vec::new());
    };
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if size <= session.byte_offset {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(session.byte_offset))?;
    let mut chunk = Vec::with_capacity((size - session.byte_offset) as usize);
    file.take(size - session.byte_offset).read_to_end(&mut chunk)?;

    session.byte_offset += chunk.len() as u64;
    Ok(split_lines(&mut session.line_buffer, &chunk))
}

/// Append `chunk` to `buffer` and drain every complete line.
///
/// Bytes after the last newline stay in `buffer`. Lines are decoded lossily
/// so a multi-byte character split across reads is only decoded once whole.
pub fn split_lines(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buffer.extend_from_slice(chunk);
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(pos) = buffer[start..].iter().position(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(&buffer[start..start + pos]);
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
        start += pos + 1;
    }
    buffer.drain(..start);
    lines
}

/// Seek a session to the current end of its transcript, skipping history.
pub fn skip_to_end(session: &mut Session) {
    if let Some(size) = session
        .transcript_path
        .as_deref()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
    {
        session.byte_offset = size;
        session.line_buffer.clear();
    }
}

/// Change notification for one transcript file. Dropping it stops all three
/// sources.
pub struct Tailer {
    path: PathBuf,
    watchers: Option<FileWatchers>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Tailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tailer")
            .field("path", &self.path)
            .field("attached", &self.watchers.is_some())
            .finish()
    }
}

impl Tailer {
    /// Start watching `path` on behalf of `session_id`. Every source posts
    /// [`MonitorInput::FileChanged`]; watcher setup failures are logged and
    /// leave the remaining sources running.
    ///
    /// A launched agent's transcript usually does not exist yet. The file
    /// watchers are then attached once it appears.
    pub fn start(
        session_id: Uuid,
        path: PathBuf,
        timing: &Timing,
        inputs: mpsc::UnboundedSender<MonitorInput>,
    ) -> Self {
        let mut tasks = Vec::new();
        let poll_interval = timing.file_poll_interval();

        let watchers = if path.exists() {
            Some(FileWatchers::attach(session_id, &path, poll_interval, inputs.clone()))
        } else {
            debug!(target: "agentscope::tailer", %session_id, path = %path.display(), "Transcript not created yet");
            let check = poll_interval.unwrap_or(CREATION_CHECK_INTERVAL);
            tasks.push(attach_when_created(
                session_id,
                path.clone(),
                poll_interval,
                check,
                inputs.clone(),
            ));
            None
        };

        if let Some(interval) = timing.manual_poll_interval() {
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if inputs.send(MonitorInput::FileChanged(session_id)).is_err() {
                        break;
                    }
                }
            }));
        }

        debug!(target: "agentscope::tailer", %session_id, path = %path.display(), "Tailing transcript");
        Self {
            path,
            watchers,
            tasks,
        }
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        trace!(target: "agentscope::tailer", path = %self.path.display(), "Tailer stopped");
    }
}

/// How often a missing transcript is checked for when the poll watcher is off.
const CREATION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// The native and stat-based watchers on one existing file.
struct FileWatchers {
    _native: Option<RecommendedWatcher>,
    _polling: Option<PollWatcher>,
}

impl FileWatchers {
    fn attach(
        session_id: Uuid,
        path: &Path,
        poll_interval: Option<Duration>,
        inputs: mpsc::UnboundedSender<MonitorInput>,
    ) -> Self {
        Self {
            _native: watch_native(session_id, path, inputs.clone()),
            _polling: poll_interval.and_then(|interval| watch_polling(session_id, path, interval, inputs)),
        }
    }
}

/// Wait for `path` to appear, then attach the file watchers and hold them
/// until the task is aborted.
fn attach_when_created(
    session_id: Uuid,
    path: PathBuf,
    poll_interval: Option<Duration>,
    check: Duration,
    inputs: mpsc::UnboundedSender<MonitorInput>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check);
        loop {
            ticker.tick().await;
            if inputs.is_closed() {
                return;
            }
            if path.exists() {
                break;
            }
        }

        let _watchers = FileWatchers::attach(session_id, &path, poll_interval, inputs.clone());
        debug!(target: "agentscope::tailer", %session_id, path = %path.display(), "Transcript created, watchers attached");
        if inputs.send(MonitorInput::FileChanged(session_id)).is_err() {
            return;
        }
        std::future::pending::<()>().await
    })
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

fn notify_handler(
    session_id: Uuid,
    inputs: mpsc::UnboundedSender<MonitorInput>,
) -> impl Fn(notify::Result<Event>) + Send + 'static {
    move |res: notify::Result<Event>| match res {
        Ok(event) if is_content_change(&event.kind) => {
            let _ = inputs.send(MonitorInput::FileChanged(session_id));
        }
        Ok(_) => {}
        Err(e) => trace!(target: "agentscope::tailer", error = %e, "Watcher error"),
    }
}

fn watch_native(
    session_id: Uuid,
    path: &Path,
    inputs: mpsc::UnboundedSender<MonitorInput>,
) -> Option<RecommendedWatcher> {
    let mut watcher = match notify::recommended_watcher(notify_handler(session_id, inputs)) {
        Ok(w) => w,
        Err(e) => {
            debug!(target: "agentscope::tailer", error = %e, "Native watcher unavailable");
            return None;
        }
    };
    match watcher.watch(path, RecursiveMode::NonRecursive) {
        Ok(()) => Some(watcher),
        Err(e) => {
            debug!(target: "agentscope::tailer", path = %path.display(), error = %e, "Native watch failed");
            None
        }
    }
}

fn watch_polling(
    session_id: Uuid,
    path: &Path,
    interval: Duration,
    inputs: mpsc::UnboundedSender<MonitorInput>,
) -> Option<PollWatcher> {
    let config = Config::default().with_poll_interval(interval);
    let mut watcher = match PollWatcher::new(notify_handler(session_id, inputs), config) {
        Ok(w) => w,
        Err(e) => {
            debug!(target: "agentscope::tailer", error = %e, "Poll watcher unavailable");
            return None;
        }
    };
    match watcher.watch(path, RecursiveMode::NonRecursive) {
        Ok(()) => Some(watcher),
        Err(e) => {
            debug!(target: "agentscope::tailer", path = %path.display(), error = %e, "Poll watch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentscope_types::Vendor;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn session_for(path: &Path) -> Session {
        let mut session = Session::new(Uuid::new_v4(), Vendor::Claude, PathBuf::from("/repo"));
        session.transcript_path = Some(path.to_path_buf());
        session
    }

    fn append(path: &Path, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let mut session = session_for(&path);

        append(&path, b"{\"a\":1}\n{\"b\":");
        assert_eq!(read_new_lines(&mut session).unwrap(), vec!["{\"a\":1}"]);
        assert_eq!(session.line_buffer, b"{\"b\":");

        append(&path, b"2}\n");
        assert_eq!(read_new_lines(&mut session).unwrap(), vec!["{\"b\":2}"]);
        assert!(session.line_buffer.is_empty());
        assert_eq!(session.byte_offset, 16);
    }

    #[test]
    fn test_repeat_read_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let mut session = session_for(&path);

        append(&path, b"one\ntwo\n");
        assert_eq!(read_new_lines(&mut session).unwrap().len(), 2);
        assert!(read_new_lines(&mut session).unwrap().is_empty());
        assert!(read_new_lines(&mut session).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_and_truncation_read_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let mut session = session_for(&path);
        assert!(read_new_lines(&mut session).unwrap().is_empty());

        append(&path, b"0123456789\n");
        read_new_lines(&mut session).unwrap();
        std::fs::write(&path, b"x\n").unwrap();
        assert!(read_new_lines(&mut session).unwrap().is_empty());
        assert_eq!(session.byte_offset, 11);
    }

    #[test]
    fn test_skip_to_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        append(&path, b"old\nhistory\n");
        let mut session = session_for(&path);
        skip_to_end(&mut session);
        assert!(read_new_lines(&mut session).unwrap().is_empty());

        append(&path, b"new\n");
        assert_eq!(read_new_lines(&mut session).unwrap(), vec!["new"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut buffer = Vec::new();
        let lines = split_lines(&mut buffer, b"a\r\n\n  \nb\n");
        assert_eq!(lines, vec!["a", "b"]);
    }

    fn file_watch_only() -> Timing {
        Timing {
            manual_poll_interval_ms: 0,
            file_poll_interval_ms: 50,
            ..Timing::default()
        }
    }

    async fn next_change(rx: &mut mpsc::UnboundedReceiver<MonitorInput>) -> Uuid {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(MonitorInput::FileChanged(id))) => id,
            other => panic!("Expected a file change notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watchers_attach_once_transcript_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predicted.jsonl");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let _tailer = Tailer::start(id, path.clone(), &file_watch_only(), tx);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        append(&path, b"{\"a\":1}\n");
        assert_eq!(next_change(&mut rx).await, id);

        // Later writes are reported by the attached watchers.
        tokio::time::sleep(Duration::from_millis(200)).await;
        while rx.try_recv().is_ok() {}
        append(&path, b"{\"b\":2}\n");
        assert_eq!(next_change(&mut rx).await, id);
    }

    #[tokio::test]
    async fn test_existing_transcript_notifies_without_manual_poll() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        append(&path, b"old\n");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let _tailer = Tailer::start(id, path.clone(), &file_watch_only(), tx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        append(&path, b"new\n");
        assert_eq!(next_change(&mut rx).await, id);
    }

    #[tokio::test]
    async fn test_dropped_tailer_stops_notifying() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tailer = Tailer::start(Uuid::new_v4(), path.clone(), &file_watch_only(), tx);
        drop(tailer);

        append(&path, b"late\n");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }

    proptest! {
        #[test]
        fn prop_any_split_yields_same_lines(
            lines in prop::collection::vec("[a-z{}\":,0-9 é]{1,20}", 1..10),
            cuts in prop::collection::vec(0usize..200, 0..6),
        ) {
            let joined: Vec<u8> = lines.iter().flat_map(|l| format!("{l}\n").into_bytes()).collect();
            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (joined.len() + 1)).collect();
            points.push(0);
            points.push(joined.len());
            points.sort_unstable();

            let mut buffer = Vec::new();
            let mut out = Vec::new();
            for pair in points.windows(2) {
                out.extend(split_lines(&mut buffer, &joined[pair[0]..pair[1]]));
            }

            let expected: Vec<String> = lines
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            prop_assert_eq!(out, expected);
            prop_assert!(buffer.is_empty());
        }
    }
}
