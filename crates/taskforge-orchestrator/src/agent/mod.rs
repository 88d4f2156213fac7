//! Agent execution core.

mod core;
mod phase;

pub use self::core::{AgentCore, AgentError};
pub use phase::TaskPhase;
