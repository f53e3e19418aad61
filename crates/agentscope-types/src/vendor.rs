//! Supported AI coding-assistant vendors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which transcript schema a session's log file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Claude Code style JSONL (`assistant`/`user`/`system`/`progress` records).
    Claude,
    /// Codex rollout files (`session_meta`, `response_item`, `event_msg` envelopes).
    Codex,
    /// Opencode role-based message JSONL.
    Opencode,
    /// Generic structured-log envelope written by wrapper scripts.
    Native,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Vendor::Claude, Vendor::Codex, Vendor::Opencode, Vendor::Native];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Claude => "claude",
            Vendor::Codex => "codex",
            Vendor::Opencode => "opencode",
            Vendor::Native => "native",
        }
    }

    /// Name of the CLI binary as it shows up in a process listing.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Vendor::Claude => "claude",
            Vendor::Codex => "codex",
            Vendor::Opencode => "opencode",
            Vendor::Native => "agent",
        }
    }

    /// Whether a session file can be tied to a workspace by reading its
    /// first record (the vendor writes a metadata line carrying its cwd).
    ///
    /// Other vendors keep one directory per project, so a file's location is
    /// already the workspace match.
    pub fn matches_by_content(&self) -> bool {
        matches!(self, Vendor::Codex)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown vendor: '{0}' (expected claude, codex, opencode or native)")]
pub struct UnknownVendor(pub String);

impl FromStr for Vendor {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "claude-code" => Ok(Vendor::Claude),
            "codex" => Ok(Vendor::Codex),
            "opencode" => Ok(Vendor::Opencode),
            "native" => Ok(Vendor::Native),
            _ => Err(UnknownVendor(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_from_str() {
        assert_eq!("claude".parse::<Vendor>().unwrap(), Vendor::Claude);
        assert_eq!("Codex".parse::<Vendor>().unwrap(), Vendor::Codex);
        assert_eq!(" opencode ".parse::<Vendor>().unwrap(), Vendor::Opencode);
        assert!("gemini".parse::<Vendor>().is_err());
    }

    #[test]
    fn test_only_codex_matches_by_content() {
        let content_matched: Vec<Vendor> = Vendor::ALL
            .into_iter()
            .filter(Vendor::matches_by_content)
            .collect();
        assert_eq!(content_matched, vec![Vendor::Codex]);
    }

    #[test]
    fn test_vendor_serde_roundtrip_name() {
        let json = serde_json::to_string(&Vendor::Opencode).unwrap();
        assert_eq!(json, "\"opencode\"");
    }
}
