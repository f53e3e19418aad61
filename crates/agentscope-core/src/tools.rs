//! Tool classification and human-readable status strings.
//!
//! Vendors name the same capability differently (`Bash`, `shell`,
//! `exec_command`, `bash`); everything downstream works on [`ToolKind`].

use serde_json::Value;
use std::path::Path;

const COMMAND_DISPLAY_MAX_CHARS: usize = 30;
const TASK_DESCRIPTION_MAX_CHARS: usize = 40;

/// What a tool does, independent of vendor naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Shell,
    Read,
    Edit,
    Write,
    Patch,
    SearchFiles,
    SearchCode,
    Fetch,
    WebSearch,
    Subtask,
    Question,
    Plan,
    Notebook,
    Other,
}

impl ToolKind {
    /// Classify a vendor tool name.
    pub fn classify(name: &str) -> ToolKind {
        match name.to_ascii_lowercase().as_str() {
            "bash" | "shell" | "exec_command" | "local_shell" | "run_command" | "exec" => {
                ToolKind::Shell
            }
            "read" | "read_file" | "view" => ToolKind::Read,
            "edit" | "multiedit" | "str_replace" | "edit_file" => ToolKind::Edit,
            "write" | "write_file" | "create_file" => ToolKind::Write,
            "apply_patch" | "patch" => ToolKind::Patch,
            "glob" | "list" | "ls" | "list_dir" | "find_files" => ToolKind::SearchFiles,
            "grep" | "search" | "code_search" => ToolKind::SearchCode,
            "webfetch" | "fetch" | "web_fetch" => ToolKind::Fetch,
            "websearch" | "web_search" | "web_search_call" => ToolKind::WebSearch,
            "task" | "agent" | "spawn_agent" | "subagent" => ToolKind::Subtask,
            "askuserquestion" | "question" | "request_user_input" | "ask_user" => {
                ToolKind::Question
            }
            "enterplanmode" | "exitplanmode" | "update_plan" | "todowrite" | "todo_write" => {
                ToolKind::Plan
            }
            "notebookedit" | "notebook_edit" => ToolKind::Notebook,
            _ => ToolKind::Other,
        }
    }

    /// Tools that never block on a human approval prompt.
    pub fn is_permission_exempt(&self) -> bool {
        matches!(self, ToolKind::Subtask | ToolKind::Question | ToolKind::Plan)
    }

    /// Shell tools get the longer permission-stall delay.
    pub fn is_shell(&self) -> bool {
        matches!(self, ToolKind::Shell)
    }
}

/// Format the status line shown while a tool runs.
pub fn format_tool_status(name: &str, input: &Value) -> String {
    match ToolKind::classify(name) {
        ToolKind::Shell => {
            let command = shell_command(input).unwrap_or_default();
            format!("Running: {}", truncate(&command, COMMAND_DISPLAY_MAX_CHARS))
        }
        ToolKind::Read => format!("Reading {}", file_label(input)),
        ToolKind::Edit => format!("Editing {}", file_label(input)),
        ToolKind::Write => format!("Writing {}", file_label(input)),
        ToolKind::Patch => "Applying patch".to_string(),
        ToolKind::SearchFiles => "Searching files".to_string(),
        ToolKind::SearchCode => "Searching code".to_string(),
        ToolKind::Fetch => "Fetching web content".to_string(),
        ToolKind::WebSearch => "Searching the web".to_string(),
        ToolKind::Subtask => match string_field(input, &["description", "prompt"]) {
            Some(desc) => format!("Subtask: {}", truncate(&desc, TASK_DESCRIPTION_MAX_CHARS)),
            None => "Running subtask".to_string(),
        },
        ToolKind::Question => "Waiting for your answer".to_string(),
        ToolKind::Plan => "Planning".to_string(),
        ToolKind::Notebook => "Editing notebook".to_string(),
        ToolKind::Other => format!("Using {}", name),
    }
}

/// Extract the command text from shell tool arguments.
///
/// Accepts `{"command": "npm test"}` as well as argv arrays such as
/// `{"command": ["bash", "-lc", "npm test"]}`, where the script after a
/// `-c`/`-lc` flag is what the user recognises.
fn shell_command(input: &Value) -> Option<String> {
    let command = input.get("command").or_else(|| input.get("cmd"))?;
    match command {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let argv: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            let script = argv
                .iter()
                .position(|arg| matches!(*arg, "-c" | "-lc"))
                .and_then(|i| argv.get(i + 1));
            match script {
                Some(script) => Some(script.to_string()),
                None => Some(argv.join(" ")),
            }
        }
        _ => None,
    }
}

fn file_label(input: &Value) -> String {
    string_field(input, &["file_path", "filePath", "path", "notebook_path"])
        .map(|p| {
            Path::new(&p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(p)
        })
        .unwrap_or_else(|| "file".to_string())
}

fn string_field(input: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| input.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Truncate to `max` characters, appending an ellipsis when cut.
pub fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shell_status_from_string_command() {
        let status = format_tool_status("Bash", &json!({"command": "npm test"}));
        assert_eq!(status, "Running: npm test");
    }

    #[test]
    fn test_shell_status_from_argv() {
        let status = format_tool_status("shell", &json!({"command": ["bash", "-lc", "cargo check"]}));
        assert_eq!(status, "Running: cargo check");

        let status = format_tool_status("shell", &json!({"command": ["ls", "-la"]}));
        assert_eq!(status, "Running: ls -la");
    }

    #[test]
    fn test_long_command_is_truncated() {
        let status = format_tool_status(
            "Bash",
            &json!({"command": "cargo test --workspace --all-features -- --nocapture"}),
        );
        assert_eq!(status, "Running: cargo test --workspace --all-f…");
    }

    #[test]
    fn test_file_tools_use_basename() {
        assert_eq!(
            format_tool_status("Read", &json!({"file_path": "/repo/src/main.rs"})),
            "Reading main.rs"
        );
        assert_eq!(
            format_tool_status("edit", &json!({"filePath": "/repo/lib.rs"})),
            "Editing lib.rs"
        );
        assert_eq!(format_tool_status("Write", &json!({})), "Writing file");
    }

    #[test]
    fn test_fixed_strings() {
        assert_eq!(format_tool_status("Glob", &json!({})), "Searching files");
        assert_eq!(format_tool_status("Grep", &json!({})), "Searching code");
        assert_eq!(format_tool_status("WebFetch", &json!({})), "Fetching web content");
        assert_eq!(format_tool_status("AskUserQuestion", &json!({})), "Waiting for your answer");
        assert_eq!(format_tool_status("Task", &json!({})), "Running subtask");
        assert_eq!(
            format_tool_status("Task", &json!({"description": "Explore the repo"})),
            "Subtask: Explore the repo"
        );
        assert_eq!(format_tool_status("mcp__github__search", &json!({})), "Using mcp__github__search");
    }

    #[test]
    fn test_exempt_kinds() {
        assert!(ToolKind::classify("Task").is_permission_exempt());
        assert!(ToolKind::classify("AskUserQuestion").is_permission_exempt());
        assert!(ToolKind::classify("update_plan").is_permission_exempt());
        assert!(!ToolKind::classify("Bash").is_permission_exempt());
        assert!(!ToolKind::classify("Edit").is_permission_exempt());
    }
}
