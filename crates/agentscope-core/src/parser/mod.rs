//! Vendor transcript parsers.
//!
//! Each vendor writes JSONL in its own shape. A [`TranscriptParser`] maps one
//! decoded record onto [`Activity`] transitions; the [`ParserRegistry`] picks
//! the parser by the session's vendor. Adding a vendor means adding a parser
//! and registering it, nothing else.

mod claude;
mod codex;
mod native;
mod opencode;

pub use claude::ClaudeParser;
pub use codex::CodexParser;
pub use native::NativeParser;
pub use opencode::OpencodeParser;

use crate::activity::{Activity, ParseContext};
use crate::session::Session;
use agentscope_types::Vendor;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Maps one vendor's transcript records to activity transitions.
pub trait TranscriptParser: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Handle one decoded record. Unknown shapes are ignored.
    fn process_record(&self, activity: &mut Activity<'_>, record: &Value);
}

/// Parsers keyed by vendor.
pub struct ParserRegistry {
    parsers: HashMap<Vendor, Box<dyn TranscriptParser>>,
}

impl ParserRegistry {
    /// A registry with no parsers.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register `parser`, replacing any parser for the same vendor.
    pub fn register(&mut self, parser: Box<dyn TranscriptParser>) {
        self.parsers.insert(parser.vendor(), parser);
    }

    pub fn get(&self, vendor: Vendor) -> Option<&dyn TranscriptParser> {
        self.parsers.get(&vendor).map(|p| p.as_ref())
    }

    /// Process one batch of complete lines read from `session`'s transcript.
    ///
    /// Arrival of the batch cancels pending timers; tools still in flight
    /// afterwards restart the permission clock.
    pub fn process_batch(&self, session: &mut Session, lines: &[String], ctx: &ParseContext) {
        let Some(parser) = self.get(session.vendor) else {
            trace!(target: "agentscope::parser", vendor = %session.vendor, "No parser registered");
            return;
        };
        let mut activity = Activity::new(session, ctx);
        activity.data_arrived();
        for line in lines {
            process_line(parser, &mut activity, line);
        }
        activity.rearm_permission_if_stalled();
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ClaudeParser));
        registry.register(Box::new(CodexParser));
        registry.register(Box::new(OpencodeParser));
        registry.register(Box::new(NativeParser));
        registry
    }
}

fn process_line(parser: &dyn TranscriptParser, activity: &mut Activity<'_>, line: &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(record @ Value::Object(_)) => parser.process_record(activity, &record),
        Ok(_) => {}
        Err(e) => {
            trace!(target: "agentscope::parser", error = %e, "Skipping malformed line");
        }
    }
}

/// String field lookup shared by the vendor parsers.
pub(crate) fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

/// Concatenated text of a content array (`[{"type":"text","text":..}]`) or a
/// bare string.
pub(crate) fn content_text(content: &Value, text_types: &[&str]) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| {
                str_field(b, "type").is_some_and(|t| text_types.contains(&t))
            })
            .filter_map(|b| str_field(b, "text"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[tokio::test(start_paused = true)]
    async fn test_malformed_lines_are_skipped() {
        let mut h = Harness::new(Vendor::Claude);
        h.feed(&[
            "{not json",
            "",
            "[1,2,3]",
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/a/b.rs"}}]}}"#,
        ]);
        assert_eq!(h.drain_kinds(), vec!["tool-start"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_has_every_vendor() {
        let registry = ParserRegistry::default();
        for vendor in Vendor::ALL {
            assert_eq!(registry.get(vendor).map(|p| p.vendor()), Some(vendor));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_vendor_is_ignored() {
        let mut h = Harness::new(Vendor::Codex);
        h.parsers = ParserRegistry::empty();
        h.feed(&[r#"{"type":"event_msg","payload":{"type":"user_message","message":"hi"}}"#]);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_content_text_joins_text_blocks() {
        let content = serde_json::json!([
            {"type": "text", "text": "one"},
            {"type": "tool_use", "id": "t"},
            {"type": "text", "text": "two"},
        ]);
        assert_eq!(content_text(&content, &["text"]), "one\ntwo");
        assert_eq!(content_text(&Value::String("s".into()), &["text"]), "s");
    }
}
