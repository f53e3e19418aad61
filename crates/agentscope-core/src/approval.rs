//! Approval-language detection in assistant prose.
//!
//! Some vendors never write an explicit "awaiting approval" record, but the
//! assistant tends to ask in plain text ("Do you want me to proceed?"). The
//! detector is a plain predicate so callers and tests can swap it out.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Returns true when `text` reads like a request for the user's approval.
#[derive(Clone)]
pub struct ApprovalDetector(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ApprovalDetector {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Detector that never fires.
    pub fn disabled() -> Self {
        Self::new(|_| false)
    }

    pub fn matches(&self, text: &str) -> bool {
        (self.0)(text)
    }
}

impl Default for ApprovalDetector {
    fn default() -> Self {
        Self::new(looks_like_approval_request)
    }
}

impl fmt::Debug for ApprovalDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApprovalDetector")
    }
}

static APPROVAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(do|would) you (want|like) me to (proceed|continue|go ahead|run|apply|make)",
        r"(?i)\bshall i (proceed|continue|go ahead|run|apply)",
        r"(?i)\bshould i (proceed|continue|go ahead|run|apply)",
        r"(?i)\b(may|can) i (proceed|continue|run|execute)",
        r"(?i)\b(approve|approval|permission)\b.*\?",
        r"(?i)\blet me know if (you want|you'd like) me to (proceed|continue)",
        r"(?i)\bwaiting for (your )?(approval|confirmation|permission)",
        r"(?i)\b(confirm|ok) to (proceed|continue)\??",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid approval pattern"))
    .collect()
});

/// Default heuristic: any of a fixed set of approval phrasings.
pub fn looks_like_approval_request(text: &str) -> bool {
    APPROVAL_PATTERNS.iter().any(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_approval_phrasing() {
        assert!(looks_like_approval_request("Do you want me to proceed with the migration?"));
        assert!(looks_like_approval_request("Shall I go ahead and apply the patch?"));
        assert!(looks_like_approval_request("I need your permission to delete these files?"));
        assert!(looks_like_approval_request("Waiting for your approval before running it."));
    }

    #[test]
    fn test_ignores_ordinary_prose() {
        assert!(!looks_like_approval_request("I updated the parser and the tests pass."));
        assert!(!looks_like_approval_request("Running the build now."));
        assert!(!looks_like_approval_request("The permission bits on the file are 0644."));
    }

    #[test]
    fn test_custom_detector() {
        let detector = ApprovalDetector::new(|text| text.contains("FIXTURE"));
        assert!(detector.matches("a FIXTURE line"));
        assert!(!detector.matches("Do you want me to proceed?"));
        assert!(!ApprovalDetector::disabled().matches("Shall I proceed?"));
    }
}
