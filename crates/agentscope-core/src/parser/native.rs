//! Generic structured-log envelope.
//!
//! Wrapper scripts around tools with no transcript of their own write:
//!
//! ```text
//! {"type":"tool_call","call_id":"1","tool":"bash","args":{"command":"ls"}}
//! {"type":"tool_result","call_id":"1"}
//! {"type":"subagent_tool_call","parent_id":"1","call_id":"2","tool":"read","args":{..}}
//! {"type":"subagent_tool_result","parent_id":"1","call_id":"2"}
//! {"type":"user","text":"..."}
//! {"type":"message","text":"..."}
//! {"type":"permission_request"}
//! {"type":"progress"}
//! {"type":"turn_end"}
//! ```

use super::{str_field, TranscriptParser};
use crate::activity::Activity;
use agentscope_types::Vendor;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeParser;

impl TranscriptParser for NativeParser {
    fn vendor(&self) -> Vendor {
        Vendor::Native
    }

    fn process_record(&self, activity: &mut Activity<'_>, record: &Value) {
        let call_id = str_field(record, "call_id")
            .or_else(|| str_field(record, "id"))
            .unwrap_or_default();
        let tool = str_field(record, "tool")
            .or_else(|| str_field(record, "name"))
            .unwrap_or("tool");
        let args = record.get("args").unwrap_or(&Value::Null);
        let parent_id = str_field(record, "parent_id").unwrap_or_default();

        match str_field(record, "type") {
            Some("tool_call") => activity.tool_started(call_id, tool, args),
            Some("tool_result") => activity.tool_finished(call_id),
            Some("subagent_tool_call") => {
                activity.subagent_tool_started(parent_id, call_id, tool, args)
            }
            Some("subagent_tool_result") => activity.subagent_tool_finished(parent_id, call_id),
            Some("user") => activity.user_input(),
            Some("message") => {
                let text = str_field(record, "text").unwrap_or_default();
                activity.assistant_prose(text);
                activity.prose_only();
            }
            Some("permission_request") => activity.permission_requested(),
            Some("progress") => activity.tool_progress(),
            Some("turn_end") => activity.turn_ended(),
            _ => {}
        }
    }
}
