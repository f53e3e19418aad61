//! Codex rollout records.
//!
//! Every line is an envelope `{"timestamp":..,"type":..,"payload":{..}}`:
//! `session_meta` first, then `response_item` (model I/O, tool calls and
//! their outputs) interleaved with `event_msg` (turn lifecycle).
//! Codex never writes an approval record, so assistant prose is checked
//! against the approval detector.

use super::{content_text, str_field, TranscriptParser};
use crate::activity::Activity;
use agentscope_types::Vendor;
use serde_json::{json, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct CodexParser;

impl TranscriptParser for CodexParser {
    fn vendor(&self) -> Vendor {
        Vendor::Codex
    }

    fn process_record(&self, activity: &mut Activity<'_>, record: &Value) {
        let Some(payload) = record.get("payload") else {
            return;
        };
        match str_field(record, "type") {
            Some("response_item") => response_item(activity, payload),
            Some("event_msg") => event_msg(activity, payload),
            _ => {}
        }
    }
}

/// `arguments` is JSON encoded as a string; fall back to the raw text.
fn decode_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| json!({ "input": s })),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn response_item(activity: &mut Activity<'_>, payload: &Value) {
    let call_id = str_field(payload, "call_id").unwrap_or_default();
    match str_field(payload, "type") {
        Some("function_call") => {
            let name = str_field(payload, "name").unwrap_or("function");
            let args = decode_arguments(payload.get("arguments"));
            activity.tool_started(call_id, name, &args);
        }
        Some("custom_tool_call") => {
            let name = str_field(payload, "name").unwrap_or("custom_tool");
            let input = json!({ "input": payload.get("input").cloned().unwrap_or(Value::Null) });
            activity.tool_started(call_id, name, &input);
        }
        Some("local_shell_call") => {
            let command = payload
                .get("action")
                .and_then(|a| a.get("command"))
                .cloned()
                .unwrap_or(Value::Null);
            activity.tool_started(call_id, "local_shell", &json!({ "command": command }));
        }
        Some("function_call_output")
        | Some("custom_tool_call_output")
        | Some("local_shell_call_output") => activity.tool_finished(call_id),
        Some("message") if str_field(payload, "role") == Some("assistant") => {
            let text = payload
                .get("content")
                .map(|c| content_text(c, &["output_text", "text"]))
                .unwrap_or_default();
            activity.assistant_prose(&text);
        }
        _ => {}
    }
}

fn event_msg(activity: &mut Activity<'_>, payload: &Value) {
    match str_field(payload, "type") {
        Some("user_message") => activity.user_input(),
        Some("task_complete") | Some("turn_complete") | Some("turn_aborted") => {
            activity.turn_ended()
        }
        Some("agent_message") => {
            let text = str_field(payload, "message").unwrap_or_default();
            activity.assistant_prose(text);
        }
        Some("exec_approval_request") | Some("apply_patch_approval_request") => {
            activity.permission_requested()
        }
        _ => {}
    }
}
