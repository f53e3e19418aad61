//! Replays recorded transcripts for each vendor through a live monitor.
//!
//! These tests verify:
//! - Each vendor's record shapes map onto the shared activity events
//! - Delayed events (tool-done, status-waiting) arrive once time passes
//! - Sub-agent tools and prose approval prompts are surfaced

use agentscope_core::{Monitor, MonitorConfig, RegisterRequest};
use agentscope_types::{ActivityEvent, Vendor};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join("transcripts")
        .join(name)
}

/// Track a copy of `fixture` and return every event after creation.
async fn replay(vendor: Vendor, fixture: &str) -> Vec<ActivityEvent> {
    let root = TempDir::new().unwrap();
    let transcript = root.path().join(fixture);
    std::fs::copy(fixture_path(fixture), &transcript)
        .unwrap_or_else(|e| panic!("Failed to copy fixture {fixture}: {e}"));

    let mut config = MonitorConfig::default();
    config.paths.claude_projects = root.path().join("claude");
    config.paths.codex_sessions = root.path().join("codex");
    config.paths.opencode_transcripts = root.path().join("opencode");
    config.paths.native_logs = root.path().join("native");
    config.timing.external_scan_interval_ms = 0;
    config.tmux.tmux_bin = "agentscope-test-missing-tmux".to_string();

    let (handle, _task) = Monitor::new(config).spawn();
    let mut events = handle.subscribe();
    handle
        .register(RegisterRequest::new(vendor, "/repo/a").transcript(&transcript))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    handle.shutdown();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if !matches!(event, ActivityEvent::AgentCreated { .. }) {
            seen.push(event);
        }
    }
    seen
}

fn kinds(events: &[ActivityEvent]) -> Vec<&'static str> {
    events.iter().map(ActivityEvent::kind).collect()
}

// ============================================================================
// CLAUDE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_claude_bash_turn() {
    let events = replay(Vendor::Claude, "claude_bash_turn.jsonl").await;
    assert_eq!(kinds(&events), vec!["tool-start", "tool-done", "status-waiting"]);
    assert!(matches!(
        &events[0],
        ActivityEvent::ToolStart { tool_id, status, .. }
            if tool_id == "t1" && status == "Running: npm test"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_claude_subagent_turn() {
    let events = replay(Vendor::Claude, "claude_subagent.jsonl").await;
    let kinds = kinds(&events);
    assert_eq!(
        kinds[..4],
        ["tools-clear", "status-active", "tool-start", "subagent-tool-start"]
    );

    // Both completions share the same display delay.
    let mut done = kinds[4..6].to_vec();
    done.sort_unstable();
    assert_eq!(done, vec!["subagent-tool-done", "tool-done"]);
    assert_eq!(kinds[6..], ["status-waiting"]);

    assert!(matches!(
        &events[3],
        ActivityEvent::SubagentToolStart { parent_tool_id, tool_id, .. }
            if parent_tool_id == "toolu_task" && tool_id == "toolu_grep"
    ));
    assert!(!kinds.contains(&"permission-wait"));
}

// ============================================================================
// CODEX
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_codex_rollout() {
    let events = replay(Vendor::Codex, "codex_rollout.jsonl").await;
    assert_eq!(
        kinds(&events),
        vec![
            "tools-clear",
            "status-active",
            "tool-start",
            "tool-done",
            "status-waiting"
        ]
    );
    assert!(matches!(
        &events[2],
        ActivityEvent::ToolStart { tool_id, .. } if tool_id == "call_abc"
    ));
}

// ============================================================================
// OPENCODE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_opencode_session() {
    let events = replay(Vendor::Opencode, "opencode_session.jsonl").await;
    assert_eq!(
        kinds(&events),
        vec![
            "tools-clear",
            "status-active",
            "tool-start",
            "tool-done",
            "status-waiting"
        ]
    );
    assert!(matches!(
        &events[2],
        ActivityEvent::ToolStart { tool_id, status, .. }
            if tool_id == "call_1" && status == "Reading config.ts"
    ));
}

// ============================================================================
// NATIVE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_native_prose_approval_prompt() {
    let events = replay(Vendor::Native, "native_session.jsonl").await;
    assert_eq!(
        kinds(&events),
        vec!["tools-clear", "status-active", "tool-start", "permission-wait"]
    );
}
