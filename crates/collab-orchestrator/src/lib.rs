//! Streaming Orchestrator (C5) — the heart of the system: fans one
//! session's mission out to its panelists and merges their partial outputs.

pub mod orchestrator;

pub use orchestrator::{OutboundChunk, Participant, StreamingOrchestrator};
