//! Claude-style transcript records.
//!
//! ```text
//! {"type":"assistant","message":{"content":[{"type":"tool_use","id":..,"name":..,"input":{..}}]}}
//! {"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":..}]}}
//! {"type":"system","subtype":"turn_duration",..}
//! {"type":"progress","parentToolUseID":..,"data":{"type":"agent_progress","message":{..}}}
//! ```

use super::{str_field, TranscriptParser};
use crate::activity::Activity;
use agentscope_types::Vendor;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct ClaudeParser;

impl TranscriptParser for ClaudeParser {
    fn vendor(&self) -> Vendor {
        Vendor::Claude
    }

    fn process_record(&self, activity: &mut Activity<'_>, record: &Value) {
        match str_field(record, "type") {
            Some("assistant") => assistant(activity, record),
            Some("user") => user(activity, record),
            Some("system") => {
                if str_field(record, "subtype") == Some("turn_duration") {
                    activity.turn_ended();
                }
            }
            Some("progress") => progress(activity, record),
            _ => {}
        }
    }
}

fn blocks(record: &Value) -> &[Value] {
    record
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn tool_uses(content: &[Value]) -> impl Iterator<Item = (&str, &str, &Value)> {
    content
        .iter()
        .filter(|b| str_field(b, "type") == Some("tool_use"))
        .filter_map(|b| {
            let id = str_field(b, "id")?;
            let name = str_field(b, "name").unwrap_or("unknown");
            Some((id, name, b.get("input").unwrap_or(&Value::Null)))
        })
}

fn tool_results(content: &[Value]) -> impl Iterator<Item = &str> {
    content
        .iter()
        .filter(|b| str_field(b, "type") == Some("tool_result"))
        .filter_map(|b| str_field(b, "tool_use_id"))
}

fn assistant(activity: &mut Activity<'_>, record: &Value) {
    let content = blocks(record);
    let mut started_any = false;
    for (id, name, input) in tool_uses(content) {
        activity.tool_started(id, name, input);
        started_any = true;
    }
    let has_text = content.iter().any(|b| {
        str_field(b, "type") == Some("text")
            && str_field(b, "text").is_some_and(|t| !t.trim().is_empty())
    });
    if !started_any && has_text {
        activity.prose_only();
    }
}

fn user(activity: &mut Activity<'_>, record: &Value) {
    // Slash-command caveats and similar bookkeeping, not typed input.
    if record.get("isMeta").and_then(Value::as_bool) == Some(true) {
        return;
    }
    let content = record.get("message").and_then(|m| m.get("content"));
    match content {
        Some(Value::String(text)) if !text.trim().is_empty() => activity.user_input(),
        Some(Value::Array(content)) => {
            let mut had_results = false;
            for id in tool_results(content) {
                activity.tool_finished(id);
                had_results = true;
            }
            let has_text = content.iter().any(|b| str_field(b, "type") == Some("text"));
            if !had_results && has_text {
                activity.user_input();
            }
        }
        _ => {}
    }
}

fn progress(activity: &mut Activity<'_>, record: &Value) {
    let Some(data) = record.get("data") else {
        return;
    };
    match str_field(data, "type") {
        Some("agent_progress") => {
            let Some(parent) = str_field(record, "parentToolUseID") else {
                return;
            };
            let Some(message) = data.get("message") else {
                return;
            };
            let content = blocks(message);
            match str_field(message, "type") {
                Some("assistant") => {
                    for (id, name, input) in tool_uses(content) {
                        activity.subagent_tool_started(parent, id, name, input);
                    }
                }
                Some("user") => {
                    for id in tool_results(content) {
                        activity.subagent_tool_finished(parent, id);
                    }
                }
                _ => {}
            }
        }
        Some("bash_progress") | Some("mcp_progress") => activity.tool_progress(),
        _ => {}
    }
}
