//! Opencode role-based message records.
//!
//! One line per message update, either flat or wrapped in `info`:
//!
//! ```text
//! {"role":"assistant","parts":[{"type":"tool","callID":"c1","tool":"bash","state":{"status":"running","input":{..}}}]}
//! {"info":{"role":"assistant","finish":"stop"},"parts":[{"type":"step-finish","reason":"stop"}]}
//! ```
//!
//! Tool parts are rewritten as their state moves, so the same call id shows
//! up repeatedly; starts and finishes are idempotent.

use super::{str_field, TranscriptParser};
use crate::activity::Activity;
use agentscope_types::Vendor;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct OpencodeParser;

impl TranscriptParser for OpencodeParser {
    fn vendor(&self) -> Vendor {
        Vendor::Opencode
    }

    fn process_record(&self, activity: &mut Activity<'_>, record: &Value) {
        let info = record.get("info").unwrap_or(record);
        let role = str_field(info, "role").or_else(|| str_field(record, "role"));
        let parts = record
            .get("parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        match role {
            Some("user") => {
                if parts.iter().any(|p| str_field(p, "type") == Some("text")) {
                    activity.user_input();
                }
            }
            Some("assistant") => assistant(activity, info, parts),
            _ => {}
        }
    }
}

fn assistant(activity: &mut Activity<'_>, info: &Value, parts: &[Value]) {
    let mut saw_tool = false;
    let mut turn_over = str_field(info, "finish") == Some("stop");

    for part in parts {
        match str_field(part, "type") {
            Some("tool") => {
                saw_tool = true;
                tool_part(activity, part);
            }
            Some("text") => {
                if let Some(text) = str_field(part, "text") {
                    activity.assistant_prose(text);
                }
            }
            Some("step-finish") if str_field(part, "reason") == Some("stop") => turn_over = true,
            _ => {}
        }
    }

    if turn_over {
        activity.turn_ended();
    } else if !saw_tool && parts.iter().any(|p| str_field(p, "type") == Some("text")) {
        activity.prose_only();
    }
}

fn tool_part(activity: &mut Activity<'_>, part: &Value) {
    let Some(call_id) = str_field(part, "callID").or_else(|| str_field(part, "id")) else {
        return;
    };
    let name = str_field(part, "tool").unwrap_or("tool");
    let state = part.get("state").unwrap_or(&Value::Null);
    match str_field(state, "status") {
        Some("pending") | Some("running") => {
            let input = state.get("input").unwrap_or(&Value::Null);
            activity.tool_started(call_id, name, input);
        }
        Some("completed") | Some("error") => activity.tool_finished(call_id),
        _ => {}
    }
}
