//! Error types for Agentscope.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AgentscopeError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Tmux error: {0}")]
    TmuxError(#[from] TmuxError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Monitor is not running")]
    ChannelClosed,
}

/// Failures of OS-level introspection (tmux, ps, pgrep, lsof).
///
/// None of these are fatal: callers treat them as "resolution unknown".
#[derive(Error, Debug)]
pub enum TmuxError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{program} failed: {message}")]
    CommandFailed { program: String, message: String },

    #[error("{0} timed out")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
