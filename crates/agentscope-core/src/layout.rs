//! Where vendors put transcripts, and how to tell which workspace one
//! belongs to.

use crate::config::VendorPaths;
use agentscope_types::Vendor;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

/// Codex buckets sessions as `YYYY/MM/DD/rollout-*.jsonl`.
const MAX_WALK_DEPTH: usize = 4;
/// The metadata record is the first line, but can carry large instructions.
const META_LINE_MAX_BYTES: u64 = 256 * 1024;

/// Directory name a vendor derives from a workspace path.
///
/// Every character outside `[A-Za-z0-9-]` becomes `-`, so
/// `/Users/me/my_app` maps to `-Users-me-my-app`.
pub fn project_hash(dir: &Path) -> String {
    dir.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

/// Directory scanned for `vendor` transcripts of `project_dir`.
pub fn sessions_dir(paths: &VendorPaths, vendor: Vendor, project_dir: &Path) -> PathBuf {
    match vendor {
        Vendor::Claude => paths.claude_projects.join(project_hash(project_dir)),
        Vendor::Codex => paths.codex_sessions.clone(),
        Vendor::Opencode => paths.opencode_transcripts.join(project_hash(project_dir)),
        Vendor::Native => paths.native_logs.join(project_hash(project_dir)),
    }
}

/// Transcript a freshly launched session will write, when the vendor lets
/// us choose the session id up front.
pub fn predicted_transcript(
    paths: &VendorPaths,
    vendor: Vendor,
    project_dir: &Path,
    session_id: Uuid,
) -> Option<PathBuf> {
    match vendor {
        Vendor::Claude => {
            Some(sessions_dir(paths, vendor, project_dir).join(format!("{session_id}.jsonl")))
        }
        _ => None,
    }
}

/// All `.jsonl` transcripts under `dir`. A missing directory is empty.
pub fn list_transcripts(vendor: Vendor, dir: &Path) -> Vec<PathBuf> {
    let depth = if vendor.matches_by_content() {
        MAX_WALK_DEPTH
    } else {
        0
    };
    let mut out = Vec::new();
    walk(dir, depth, &mut out);
    out.sort();
    out
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if depth > 0 {
                walk(&path, depth - 1, out);
            }
        } else if path.extension().is_some_and(|ext| ext == "jsonl") {
            out.push(path);
        }
    }
}

pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Workspace metadata from a transcript's first record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub cwd: PathBuf,
    pub id: Option<String>,
}

/// Read the `session_meta` record a content-matched vendor writes first.
pub fn read_session_meta(path: &Path) -> Option<SessionMeta> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file).take(META_LINE_MAX_BYTES);
    let mut first = String::new();
    reader.read_line(&mut first).ok()?;

    let record: Value = match serde_json::from_str(first.trim()) {
        Ok(v) => v,
        Err(e) => {
            trace!(target: "agentscope::layout", path = %path.display(), error = %e, "No session metadata");
            return None;
        }
    };
    if record.get("type").and_then(Value::as_str) != Some("session_meta") {
        return None;
    }
    let payload = record.get("payload")?;
    Some(SessionMeta {
        cwd: PathBuf::from(payload.get("cwd")?.as_str()?),
        id: payload.get("id").and_then(Value::as_str).map(str::to_string),
    })
}

/// Whether a content-matched transcript belongs to `workspace` and, for a
/// session we launched, was created after the launch (allowing `skew`).
pub fn matches_workspace(
    meta: &SessionMeta,
    file_time: Option<DateTime<Utc>>,
    workspace: &Path,
    launched_at: Option<DateTime<Utc>>,
    skew: Duration,
) -> bool {
    if meta.cwd != workspace {
        return false;
    }
    match (launched_at, file_time) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(launch), Some(file_time)) => {
            let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
            file_time >= launch - skew
        }
    }
}
