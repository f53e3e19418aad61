//! Shared types for the Agentscope activity monitor.

mod event;
mod snapshot;
mod vendor;

pub use event::*;
pub use snapshot::*;
pub use vendor::*;
