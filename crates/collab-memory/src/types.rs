use serde::{Deserialize, Serialize};

use collab_core::types::{Author, CollaborationEventKind, MessageId, MessageKind, SynapseId, SynapseKind};

/// One finalized turn in the shared conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub kind: MessageKind,
    pub content: String,
    /// Ids of prior messages this one was classified as building on.
    #[serde(default)]
    pub synapse_refs: Vec<MessageId>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn new(author: Author, kind: MessageKind, content: String) -> Self {
        Self {
            id: MessageId::new(),
            author,
            kind,
            content,
            synapse_refs: Vec::new(),
            metadata: serde_json::Map::new(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// A detected cross-participant building relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapseConnection {
    pub id: SynapseId,
    pub kind: SynapseKind,
    pub strength: f32,
    pub from_message: MessageId,
    pub anchor_message: MessageId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Log entry for a notable collaboration-level occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationEvent {
    pub kind: CollaborationEventKind,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One entry of a rendered context view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: ContextEntryRole,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextEntryRole {
    System,
    User,
    Assistant,
}

/// Aggregate counters returned by `stats()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub message_count: usize,
    pub synapse_count: usize,
    pub synapses_by_kind: std::collections::BTreeMap<String, usize>,
    pub messages_by_participant: std::collections::BTreeMap<String, usize>,
    /// synapses / max(messages, 1).
    pub collaboration_density: f32,
}

/// Lossless serialization of a `GroupMemory` for C7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMemorySnapshot {
    pub messages: Vec<Message>,
    pub synapses: Vec<SynapseConnection>,
    pub events: Vec<CollaborationEvent>,
    pub summary: Option<String>,
    /// Index (into `messages`) of the point up to which `summary` covers.
    pub summarized_through: usize,
}

/// Events delivered to C4 subscribers.
#[derive(Debug, Clone)]
pub enum MemoryUpdate {
    MessageAdded(Message),
    SynapseDetected(SynapseConnection),
    ContextUpdated,
}
