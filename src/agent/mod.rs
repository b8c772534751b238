//! Agent module - single agents and their bounded memory
//!
//! Contains the tool-calling chat cycle used directly by callers and by
//! collaborations.

pub mod chat;
pub mod memory;

pub use chat::{Agent, AgentBuilder, AgentMemoryStats, DEFAULT_AGENT_NAME};
pub use memory::{Memory, MemoryEntry};
