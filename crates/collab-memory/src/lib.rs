//! Synapse Detector (C2), Context Summarizer (C3), and Group Memory (C4) —
//! the shared conversation log one session's panelists collaborate through.

pub mod error;
pub mod manager;
pub mod summarizer;
pub mod synapse;
pub mod types;

pub use error::MemoryError;
pub use manager::GroupMemory;
pub use types::{
    CollaborationEvent, ContextEntry, ContextEntryRole, GroupMemorySnapshot, MemoryStats,
    MemoryUpdate, Message, SynapseConnection,
};
